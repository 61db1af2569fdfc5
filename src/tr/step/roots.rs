//! Real roots of quadratic and cubic polynomials.
//!
//! Used by the DTRS secular-equation iteration for its higher-order Taylor
//! corrections. Roots are returned in increasing order and polished with one
//! Newton step.

/// Real roots of a polynomial, smallest first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Roots {
    /// Number of real roots found
    pub nroots: usize,
    pub root1: f64,
    pub root2: f64,
    pub root3: f64,
}

impl Roots {
    fn none() -> Self {
        Self {
            nroots: 0,
            root1: 0.0,
            root2: 0.0,
            root3: 0.0,
        }
    }
}

/// Transfer the sign of `b` onto the magnitude of `a`.
fn sign(a: f64, b: f64) -> f64 {
    if b >= 0.0 {
        a.abs()
    } else {
        -a.abs()
    }
}

/// Real roots of `a2·x² + a1·x + a0 = 0`.
///
/// `tol` decides when the quadratic term is too small relative to the linear
/// one to be treated as a true quadratic.
pub fn roots_quadratic(a0: f64, a1: f64, a2: f64, tol: f64) -> Roots {
    let mut roots = Roots::none();
    let rhs = tol * a1 * a1;

    if (a0 * a2).abs() > rhs {
        roots.root2 = a1 * a1 - 4.0 * a2 * a0;
        if roots.root2.abs() <= (f64::EPSILON * a1).powi(2) {
            // numerically a double root
            roots.nroots = 2;
            roots.root1 = -0.5 * a1 / a2;
            roots.root2 = roots.root1;
        } else if roots.root2 < 0.0 {
            return Roots::none();
        } else {
            let d = -0.5 * (a1 + sign(roots.root2.sqrt(), a1));
            roots.nroots = 2;
            roots.root1 = d / a2;
            roots.root2 = a0 / d;
            if roots.root1 > roots.root2 {
                std::mem::swap(&mut roots.root1, &mut roots.root2);
            }
        }
    } else if a2 == 0.0 {
        if a1 == 0.0 {
            if a0 == 0.0 {
                roots.nroots = 1;
                roots.root1 = 0.0;
            }
            roots.root2 = 0.0;
        } else {
            roots.nroots = 1;
            roots.root1 = -a0 / a1;
            roots.root2 = 0.0;
        }
    } else {
        // a0 is negligible: one root at zero
        roots.nroots = 2;
        roots.root1 = 0.0;
        roots.root2 = -a1 / a2;
        if roots.root1 > roots.root2 {
            std::mem::swap(&mut roots.root1, &mut roots.root2);
        }
    }

    // one Newton step per root
    let polish = |x: f64| {
        let p = (a2 * x + a1) * x + a0;
        let pprime = 2.0 * a2 * x + a1;
        if pprime != 0.0 {
            x - p / pprime
        } else {
            x
        }
    };
    if roots.nroots >= 1 {
        roots.root1 = polish(roots.root1);
    }
    if roots.nroots == 2 {
        roots.root2 = polish(roots.root2);
    }

    roots
}

/// Real roots of `a3·x³ + a2·x² + a1·x + a0 = 0`, using Nonweiler's method.
///
/// When there is only one real root it is returned in `root1`.
pub fn roots_cubic(a0: f64, a1: f64, a2: f64, a3: f64, tol: f64) -> Roots {
    // degenerate cubic
    if a3 == 0.0 {
        let mut roots = roots_quadratic(a0, a1, a2, tol);
        roots.root3 = f64::INFINITY;
        return roots;
    }

    // zero root: deflate to a quadratic
    if a0 == 0.0 {
        let quadratic = roots_quadratic(a1, a2, a3, tol);
        let mut roots = Roots {
            nroots: quadratic.nroots + 1,
            root1: 0.0,
            root2: quadratic.root1,
            root3: quadratic.root2,
        };
        match quadratic.nroots {
            0 => {}
            1 => {
                if roots.root2 < 0.0 {
                    roots.root1 = roots.root2;
                    roots.root2 = 0.0;
                }
            }
            _ => sort_three(&mut roots),
        }
        return roots;
    }

    let mut roots = Roots::none();

    let c0 = a0 / a3;
    let c1 = a1 / a3;
    let c2 = a2 / a3;

    let s = c2 / 3.0;
    let mut t = s * c2;
    let mut b = 0.5 * (s * (2.0 / 3.0 * t - c1) + c0);
    t = (t - c1) / 3.0;
    let mut c = t * t * t;
    let mut d = b * b - c;

    if d >= 0.0 {
        // one real root (or a repeated pair)
        d = (d.sqrt() + b.abs()).powf(1.0 / 3.0);
        if d != 0.0 {
            b = if b > 0.0 { -d } else { d };
            c = t / b;
        }
        d = (0.75_f64).sqrt() * (b - c);
        b += c;
        c = -0.5 * b - s;
        roots.root1 = b - s;
        if d == 0.0 {
            roots.nroots = 3;
            roots.root2 = c;
            roots.root3 = c;
        } else {
            roots.nroots = 1;
        }
    } else {
        // three real roots
        d = if b == 0.0 {
            2.0 / 3.0 * 1.0_f64.atan()
        } else {
            ((-d).sqrt() / b.abs()).atan() / 3.0
        };
        b = if b < 0.0 { 2.0 * t.sqrt() } else { -2.0 * t.sqrt() };
        c = d.cos() * b;
        t = -(0.75_f64).sqrt() * d.sin() * b - 0.5 * c;
        d = -t - c - s;
        c -= s;
        t -= s;
        if c.abs() > t.abs() {
            roots.root3 = c;
        } else {
            roots.root3 = t;
            t = c;
        }
        if d.abs() > t.abs() {
            roots.root2 = d;
        } else {
            roots.root2 = t;
            t = d;
        }
        roots.root1 = t;
        roots.nroots = 3;
    }

    if roots.nroots == 3 {
        sort_three(&mut roots);
    }

    let polish = |x: f64| {
        let p = ((a3 * x + a2) * x + a1) * x + a0;
        let pprime = (3.0 * a3 * x + 2.0 * a2) * x + a1;
        if pprime != 0.0 {
            x - p / pprime
        } else {
            x
        }
    };
    roots.root1 = polish(roots.root1);
    if roots.nroots == 3 {
        roots.root2 = polish(roots.root2);
        roots.root3 = polish(roots.root3);
    }

    roots
}

/// Put three roots in increasing order.
fn sort_three(roots: &mut Roots) {
    if roots.root1 > roots.root2 {
        std::mem::swap(&mut roots.root1, &mut roots.root2);
    }
    if roots.root2 > roots.root3 {
        let mut a = roots.root3;
        if roots.root1 > roots.root3 {
            a = roots.root1;
            roots.root1 = roots.root3;
        }
        roots.root3 = roots.root2;
        roots.root2 = a;
    }
}
