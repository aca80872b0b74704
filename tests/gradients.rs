//! Forward-mode gradients against central differences at random points.
use approx::assert_relative_eq;
use pcg_rand::Pcg64;
use rand::Rng;
use rpn_solver::{compile, derivative, Tape};

const SAMPLES: usize = 50;

/// Compare every partial derivative of `tape` at `x` with a finite difference
/// of the dual-mode value.
fn check_gradient(tape: &Tape, x: &[f64]) {
    let (val, row) = tape.gradient_row(x);
    assert_eq!(row.len(), x.len());
    for (j, &analytic) in row.iter().enumerate() {
        let numeric = derivative(x[j], |t| {
            let mut probe = x.to_vec();
            probe[j] = t;
            tape.evaluate(&probe).value()
        });
        assert_relative_eq!(analytic, numeric, epsilon = 1e-6, max_relative = 1e-5);
    }
    assert_eq!(val, tape.evaluate(x).value());
}

fn check_unary(expression: &str, low: f64, high: f64) {
    let tape = compile(&["x"], expression).unwrap();
    let mut rng = Pcg64::new_unseeded();
    for _ in 0..SAMPLES {
        let x = rng.gen_range(low..high);
        check_gradient(&tape, &[x]);
        assert_relative_eq!(tape.evaluate_value(&[x]), tape.evaluate(&[x]).value());
    }
}

fn check_binary(expression: &str, x_range: (f64, f64), y_range: (f64, f64)) {
    let tape = compile(&["x", "y"], expression).unwrap();
    let mut rng = Pcg64::new_unseeded();
    for _ in 0..SAMPLES {
        let x = rng.gen_range(x_range.0..x_range.1);
        let y = rng.gen_range(y_range.0..y_range.1);
        check_gradient(&tape, &[x, y]);
    }
}

#[test]
fn trigonometric() {
    check_unary("x sin", -3., 3.);
    check_unary("x cos", -3., 3.);
    check_unary("x tan", -1.2, 1.2);
}

#[test]
fn inverse_trigonometric() {
    check_unary("x asin", -0.9, 0.9);
    check_unary("x acos", -0.9, 0.9);
    check_unary("x atan", -5., 5.);
}

#[test]
fn exponential_and_roots() {
    check_unary("x exp", -3., 3.);
    check_unary("x log", 0.1, 5.);
    check_unary("x sqrt", 0.1, 5.);
    check_unary("x neg", -3., 3.);
}

#[test]
fn powers() {
    check_unary("x 3 ^", -3., 3.);
    check_unary("2 x ^", -2., 2.);
    check_unary("x 0.5 ^", 0.1, 5.);
    check_binary("x y ^", (0.5, 3.), (-2., 2.));
}

#[test]
fn arithmetic() {
    check_binary("x y +", (-3., 3.), (-3., 3.));
    check_binary("x y -", (-3., 3.), (-3., 3.));
    check_binary("x y *", (-3., 3.), (-3., 3.));
    check_binary("x y /", (-3., 3.), (0.5, 3.));
    check_binary("x y /", (-3., 3.), (-3., -0.5));
}

#[test]
fn smooth_extrema() {
    check_binary("x y max", (-3., 3.), (-3., 3.));
    check_binary("x y min", (-3., 3.), (-3., 3.));
    check_binary("x 2 * y max 1 +", (-3., 3.), (-3., 3.));
}

#[test]
fn composite() {
    check_binary("x y * sin y exp / x y max +", (-2., 2.), (-2., 2.));
    check_binary("x x * y y * + sqrt", (0.5, 2.), (0.5, 2.));
    check_binary("y x 2 ^ - 10 * 2 ^ 1 x - 2 ^ +", (-2., 2.), (-2., 2.));
}
