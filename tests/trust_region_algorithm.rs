//! Integration tests for the trust-region driver.

use approx::assert_relative_eq;
use ndarray::{array, Array1, Array2};
use trnlls_rs::tr::{
    Inform, ModelKind, Options, SolverState, Status, StepMethod, TrUpdateStrategy,
    TrustRegionSolver, Workspace,
};
use trnlls_rs::{NllsError, Problem, Result};

/// Test Problem: Rosenbrock written as residuals f = (10(x₂ − x₁²), 1 − x₁)
struct Rosenbrock;

impl Problem for Rosenbrock {
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
        let (x1, x2) = (params[0], params[1]);
        Ok(array![10.0 * (x2 - x1 * x1), 1.0 - x1])
    }

    fn parameter_count(&self) -> usize {
        2
    }

    fn residual_count(&self) -> usize {
        2
    }

    fn jacobian(&self, params: &Array1<f64>) -> Result<Array2<f64>> {
        Ok(array![[-20.0 * params[0], 10.0], [-1.0, 0.0]])
    }

    fn hessian(&self, _params: &Array1<f64>, residuals: &Array1<f64>) -> Result<Array2<f64>> {
        // only the first residual is curved
        Ok(array![[-20.0 * residuals[0], 0.0], [0.0, 0.0]])
    }

    fn has_exact_hessian(&self) -> bool {
        true
    }
}

/// Rosenbrock residuals and Jacobian without second derivatives.
struct FirstOrderRosenbrock;

impl Problem for FirstOrderRosenbrock {
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
        Rosenbrock.eval(params)
    }

    fn parameter_count(&self) -> usize {
        2
    }

    fn residual_count(&self) -> usize {
        2
    }

    fn jacobian(&self, params: &Array1<f64>) -> Result<Array2<f64>> {
        Rosenbrock.jacobian(params)
    }
}

/// f(x) = 1 + slope·(x − origin), paired with a Jacobian of the wrong sign so
/// that every trial step goes uphill.
struct Uphill {
    origin: f64,
    slope: f64,
}

impl Problem for Uphill {
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
        Ok(array![1.0 + self.slope * (params[0] - self.origin)])
    }

    fn parameter_count(&self) -> usize {
        1
    }

    fn residual_count(&self) -> usize {
        1
    }

    fn jacobian(&self, _params: &Array1<f64>) -> Result<Array2<f64>> {
        Ok(array![[-1.0]])
    }
}

/// Test Problem: exponential decay y = A·exp(−k·t) with a nonzero residual
struct ExponentialDecay {
    t: Array1<f64>,
    y: Array1<f64>,
}

impl ExponentialDecay {
    fn new() -> Self {
        let t: Array1<f64> = Array1::linspace(0.0, 4.0, 12);
        // small alternating perturbation so the optimum has a residual
        let y = Array1::from_shape_fn(t.len(), |i| {
            let bump = if i % 2 == 0 { 0.01 } else { -0.01 };
            3.0 * (-0.7 * t[i]).exp() + bump
        });
        Self { t, y }
    }
}

impl Problem for ExponentialDecay {
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
        let (a, k) = (params[0], params[1]);
        Ok(Array1::from_shape_fn(self.t.len(), |i| {
            a * (-k * self.t[i]).exp() - self.y[i]
        }))
    }

    fn parameter_count(&self) -> usize {
        2
    }

    fn residual_count(&self) -> usize {
        self.t.len()
    }
}

/// A problem whose evaluation always fails.
struct Broken;

impl Problem for Broken {
    fn eval(&self, _params: &Array1<f64>) -> Result<Array1<f64>> {
        Err(NllsError::FunctionEvaluation("model is undefined".to_string()))
    }

    fn parameter_count(&self) -> usize {
        1
    }

    fn residual_count(&self) -> usize {
        3
    }
}

#[test]
fn test_every_strategy_solves_rosenbrock() {
    for method in [
        StepMethod::DogLeg,
        StepMethod::Aint,
        StepMethod::MoreSorensen,
        StepMethod::Dtrs,
    ] {
        let model = if method == StepMethod::DogLeg {
            ModelKind::GaussNewton
        } else {
            ModelKind::Hybrid
        };
        let solver = TrustRegionSolver::new()
            .with_method(method)
            .with_model(model)
            .with_max_iterations(200);
        let result = solver.minimize(&Rosenbrock, array![-1.2, 1.0]).unwrap();

        assert!(result.success, "{:?}: {}", method, result);
        assert_relative_eq!(result.params[0], 1.0, epsilon = 1e-4);
        assert_relative_eq!(result.params[1], 1.0, epsilon = 1e-4);
        assert!(result.inform.convergence_normf);
    }
}

#[test]
fn test_exact_newton_model() {
    let solver = TrustRegionSolver::new()
        .with_model(ModelKind::Newton)
        .with_exact_second_derivatives(true)
        .with_max_iterations(200);
    let result = solver.minimize(&Rosenbrock, array![-1.2, 1.0]).unwrap();

    assert!(result.success, "{}", result);
    assert_relative_eq!(result.params[0], 1.0, epsilon = 1e-4);
    assert!(result.hess_evals >= 1);
    assert_eq!(result.jac_evals, result.iterations + 1);
}

#[test]
fn test_nonzero_residual_problem_with_finite_differences() {
    let problem = ExponentialDecay::new();
    for strategy in [TrUpdateStrategy::StepFunction, TrUpdateStrategy::Continuous] {
        let solver = TrustRegionSolver::new()
            .with_update_strategy(strategy)
            .with_max_iterations(200);
        let result = solver.minimize(&problem, array![1.0, 0.1]).unwrap();

        assert!(result.success, "{:?}: {}", strategy, result);
        assert!(result.inform.convergence_normg);
        assert_relative_eq!(result.params[0], 3.0, epsilon = 0.05);
        assert_relative_eq!(result.params[1], 0.7, epsilon = 0.05);
        assert!(result.cost > 0.0);
    }
}

#[test]
fn test_iterate_by_hand() {
    let solver = TrustRegionSolver::new().with_max_iterations(200);
    let mut x = array![-1.2, 1.0];
    let mut w = Workspace::new(2, 2, solver.options());
    let mut inform = Inform::default();
    assert_eq!(w.state(), SolverState::Uninitialized);

    let mut calls = 0;
    while solver.iterate(&Rosenbrock, &mut x, &mut w, &mut inform).unwrap() {
        calls += 1;
        assert_eq!(w.state(), SolverState::Iterating);
        assert!(w.radius() > 0.0);
        assert!(calls < 200);
    }

    assert_eq!(w.state(), SolverState::Converged);
    assert!(w.convergence().is_converged());
    assert_eq!(inform.iter, calls + 1);
    assert!(inform.converged());
    assert_relative_eq!(inform.obj, 0.5 * w.residuals().dot(w.residuals()), epsilon = 1e-15);

    // a converged workspace stays converged
    assert!(!solver.iterate(&Rosenbrock, &mut x, &mut w, &mut inform).unwrap());
}

#[test]
fn test_iterate_records_configuration_errors() {
    let solver = TrustRegionSolver::new();
    let mut w = Workspace::new(2, 1, solver.options());
    let mut inform = Inform::default();
    let mut x = array![0.0, 0.0];

    struct Tiny;
    impl Problem for Tiny {
        fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
            Ok(array![params[0] + params[1]])
        }
        fn parameter_count(&self) -> usize {
            2
        }
        fn residual_count(&self) -> usize {
            1
        }
    }

    let err = solver.iterate(&Tiny, &mut x, &mut w, &mut inform).unwrap_err();
    assert!(matches!(err, NllsError::TooFewObservations { n: 2, m: 1 }));
    assert_eq!(inform.status, Status::TooFewObservations);
    assert_eq!(w.state(), SolverState::Failed);
}

#[test]
fn test_failing_evaluation_is_an_error() {
    let err = TrustRegionSolver::new()
        .minimize(&Broken, array![1.0])
        .unwrap_err();
    assert!(matches!(err, NllsError::FunctionEvaluation(_)));
}

#[test]
fn test_options_from_json() {
    let options = Options::from_json(r#"{ "nlls_method": "MoreSorensen", "maxit": 300 }"#).unwrap();
    assert_eq!(options.nlls_method, StepMethod::MoreSorensen);
    assert_eq!(options.maxit, 300);
    assert_eq!(options.model, ModelKind::Hybrid);

    let result = TrustRegionSolver::with_options(options)
        .minimize(&Rosenbrock, array![-1.2, 1.0])
        .unwrap();
    assert!(result.success, "{}", result);

    let invalid = Options::from_json(r#"{ "initial_radius": -1.0 }"#);
    assert!(matches!(invalid, Err(NllsError::InvalidInput(_))));
}

#[test]
fn test_relative_initial_radius() {
    let options = Options {
        relative_tr_radius: true,
        initial_radius_scale: 0.01,
        ..Options::default()
    };
    let result = TrustRegionSolver::with_options(options)
        .with_max_iterations(300)
        .minimize(&Rosenbrock, array![-1.2, 1.0])
        .unwrap();
    assert!(result.success, "{}", result);
}

#[test]
fn test_exact_hessian_request_without_second_derivatives() {
    let solver = TrustRegionSolver::new()
        .with_model(ModelKind::Newton)
        .with_exact_second_derivatives(true);
    let mut x = array![-1.2, 1.0];
    let mut w = Workspace::new(2, 2, solver.options());
    let mut inform = Inform::default();

    for _ in 0..3 {
        if !solver.iterate(&FirstOrderRosenbrock, &mut x, &mut w, &mut inform).unwrap() {
            break;
        }
    }

    // the quasi-Newton approximation stands in for the missing Hessian
    assert!(!w.uses_exact_hessian());
    assert!(w.uses_second_derivatives());
    assert_eq!(inform.h_eval, 0);
    assert!(w.hessian_term().iter().any(|&v| v != 0.0));

    // the same request on a problem with second derivatives uses them
    let mut x = array![-1.2, 1.0];
    let mut w = Workspace::new(2, 2, solver.options());
    let mut inform = Inform::default();
    solver.iterate(&Rosenbrock, &mut x, &mut w, &mut inform).unwrap();
    assert!(w.uses_exact_hessian());
    assert!(inform.h_eval >= 1);
}

#[test]
fn test_trust_region_reduction_limit() {
    let options = Options {
        max_tr_decrease: 3,
        ..Options::default()
    };
    let problem = Uphill {
        origin: 0.0,
        slope: 1.0,
    };
    let result = TrustRegionSolver::with_options(options)
        .minimize(&problem, array![0.0])
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.inform.status, Status::MaxTrustRegionReductions);
    assert_eq!(result.iterations, 1);
    // the initial evaluation plus max_tr_decrease + 1 rejected trials
    assert_eq!(result.func_evals, 5);
    assert_eq!(result.params[0], 0.0);
}

#[test]
fn test_negligible_rejected_step_stops_with_no_progress() {
    // near 1e6 a step of 1e-10 moves x by one unit in the last place, which is
    // below machine precision relative to x
    let problem = Uphill {
        origin: 1e6,
        slope: 1e12,
    };
    let result = TrustRegionSolver::new()
        .with_initial_radius(1e-10)
        .minimize(&problem, array![1e6])
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.inform.status, Status::NoProgress);
    assert_eq!(result.func_evals, 2);
    assert_eq!(result.params[0], 1e6);
}

