//! Integration tests for the trust-region subproblem strategies.

use approx::assert_relative_eq;
use ndarray::{array, Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use trnlls_rs::linalg::norm2;
use trnlls_rs::tr::step::dtrs::{dtrs_solve, DtrsControl};
use trnlls_rs::tr::{ModelKind, Options, ScalingPolicy, StepMethod, StepSolver, StepStrategy};

const METHODS: [StepMethod; 4] = [
    StepMethod::DogLeg,
    StepMethod::Aint,
    StepMethod::MoreSorensen,
    StepMethod::Dtrs,
];

fn options_for(method: StepMethod) -> Options {
    Options {
        nlls_method: method,
        model: if method == StepMethod::DogLeg {
            ModelKind::GaussNewton
        } else {
            ModelKind::Hybrid
        },
        scale: ScalingPolicy::None,
        ..Options::default()
    }
}

/// A = diag(4, 1), v = (4, 1); the Gauss-Newton step (-1, -1) lies outside Δ = 0.5.
fn boundary_problem() -> (Array2<f64>, Array1<f64>, Array2<f64>, Array1<f64>) {
    let j = array![[2.0, 0.0], [0.0, 1.0]];
    let f = array![2.0, 1.0];
    let hf = Array2::zeros((2, 2));
    let g = -j.t().dot(&f);
    (j, f, hf, g)
}

#[test]
fn test_fresh_workspaces_give_identical_steps() {
    let (j, f, hf, g) = boundary_problem();
    for method in METHODS {
        let options = options_for(method);
        let mut first = StepSolver::new(2, 2, &options);
        let mut second = StepSolver::new(2, 2, &options);

        let a = first.calculate_step(&j, &f, &hf, &g, 0.5, &options).unwrap();
        let b = second.calculate_step(&j, &f, &hf, &g, 0.5, &options).unwrap();
        assert_eq!(a.step, b.step, "{:?}", method);
        assert_eq!(a.norm, b.norm, "{:?}", method);
    }
}

#[test]
fn test_exact_strategies_agree_on_boundary_step() {
    let (j, f, hf, g) = boundary_problem();
    let delta = 0.5;

    let mut steps = Vec::new();
    for method in [StepMethod::Aint, StepMethod::MoreSorensen, StepMethod::Dtrs] {
        let options = options_for(method);
        let mut solver = StepSolver::new(2, 2, &options);
        let result = solver.calculate_step(&j, &f, &hf, &g, delta, &options).unwrap();
        steps.push(result.step);
    }

    let aint = &steps[0];
    assert_relative_eq!(norm2(aint), delta, epsilon = 1e-8);
    // DTRS converges to the same point to solver precision
    assert_relative_eq!(steps[2][0], aint[0], epsilon = 1e-6);
    assert_relative_eq!(steps[2][1], aint[1], epsilon = 1e-6);
    // More-Sorensen stops once ‖d‖ is within 1e-3·Δ of the boundary
    assert_relative_eq!(steps[1][0], aint[0], epsilon = 5e-3);
    assert_relative_eq!(steps[1][1], aint[1], epsilon = 5e-3);
}

#[test]
fn test_interior_steps_are_the_newton_step() {
    let (j, f, hf, g) = boundary_problem();
    for method in METHODS {
        let options = options_for(method);
        let mut solver = StepSolver::new(2, 2, &options);
        let result = solver.calculate_step(&j, &f, &hf, &g, 10.0, &options).unwrap();
        assert_relative_eq!(result.step[0], -1.0, epsilon = 1e-10);
        assert_relative_eq!(result.step[1], -1.0, epsilon = 1e-10);
        assert_eq!(solver.method(), method);
    }
}

#[test]
fn test_scaled_step_stays_a_descent_direction() {
    let j = array![[100.0, 0.0], [0.0, 0.01], [1.0, 1.0]];
    let f = array![1.0, 1.0, 1.0];
    let hf = Array2::zeros((2, 2));
    let g = -j.t().dot(&f);

    for method in [StepMethod::MoreSorensen, StepMethod::Dtrs] {
        let options = Options {
            nlls_method: method,
            scale: ScalingPolicy::JacobianNorm,
            ..Options::default()
        };
        let mut solver = StepSolver::new(2, 3, &options);
        let result = solver.calculate_step(&j, &f, &hf, &g, 0.1, &options).unwrap();
        assert!(result.step.dot(&g) > 0.0, "{:?}", method);
        assert!(result.step.iter().all(|v| v.is_finite()));
    }
}

#[test]
fn test_dtrs_interior_solution_is_unshifted() {
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let n = 6;
    let h = Array1::from_shape_fn(n, |_| rng.gen_range(1.0..5.0));
    let c = Array1::from_shape_fn(n, |_| rng.gen_range(-1.0..1.0));
    let mut x = Array1::zeros(n);

    let inform = dtrs_solve(100.0, 0.0, &c, &h, &mut x, &DtrsControl::default());
    assert!(inform.status.is_ok());
    assert_eq!(inform.multiplier, 0.0);
    for i in 0..n {
        assert_relative_eq!(x[i], -c[i] / h[i], epsilon = 1e-12);
    }
}

#[test]
fn test_dtrs_boundary_solution_is_on_the_boundary() {
    let control = DtrsControl::default();
    for seed in 0..5 {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let n = 5;
        let h = Array1::from_shape_fn(n, |_| rng.gen_range(-2.0..3.0));
        let c = Array1::from_shape_fn(n, |_| rng.gen_range(0.5..1.5));
        let radius = 0.3;
        let mut x = Array1::zeros(n);

        let inform = dtrs_solve(radius, 0.0, &c, &h, &mut x, &control);
        assert!(inform.status.is_ok());

        let tol = (control.stop_normal * radius).max(control.stop_absolute_normal);
        assert!((norm2(&x) - radius).abs() <= tol, "seed {}", seed);
        for i in 0..n {
            assert_relative_eq!(
                x[i],
                -c[i] / (h[i] + inform.multiplier),
                epsilon = 1e-6,
                max_relative = 1e-6
            );
        }
    }
}
