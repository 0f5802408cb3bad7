use std::ops::{Add, Div, Mul, Sub};

/// A dual number `real + dual * ε` with `ε² = 0`.
///
/// Evaluating an expression over dual numbers carries its derivative along in the `dual`
/// part, seeding one variable with `dual = 1` yields the derivative with respect to it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Dual {
    pub real: f32,
    pub dual: f32,
}

impl Dual {
    /// A value whose derivative is zero.
    pub fn constant(real: f32) -> Self {
        Self { real, dual: 0. }
    }

    /// The value being differentiated against.
    pub fn seed(real: f32) -> Self {
        Self { real, dual: 1. }
    }

    pub fn sqrt(self) -> Self {
        let real = self.real.sqrt();
        Self {
            real,
            dual: self.dual / (2. * real),
        }
    }

    pub fn exp(self) -> Self {
        let real = self.real.exp();
        Self {
            real,
            dual: self.dual * real,
        }
    }

    pub fn ln(self) -> Self {
        Self {
            real: self.real.ln(),
            dual: self.dual / self.real,
        }
    }

    pub fn logistic(self) -> Self {
        let real = 1. / (1. + (-self.real).exp());
        Self {
            real,
            dual: self.dual * real * (1. - real),
        }
    }

    pub fn tanh(self) -> Self {
        let real = self.real.tanh();
        Self {
            real,
            dual: self.dual * (1. - real * real),
        }
    }

    /// `self` raised to `exponent`.
    ///
    /// The `ln(self)` term only appears when the exponent has a derivative, so negative
    /// bases with constant exponents still differentiate.
    pub fn pow(self, exponent: Self) -> Self {
        let real = self.real.powf(exponent.real);
        let mut dual = exponent.real * self.real.powf(exponent.real - 1.) * self.dual;

        if exponent.dual != 0. {
            dual += real * self.real.ln() * exponent.dual;
        }

        Self { real, dual }
    }
}

impl Add for Dual {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            real: self.real + rhs.real,
            dual: self.dual + rhs.dual,
        }
    }
}

impl Sub for Dual {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self {
            real: self.real - rhs.real,
            dual: self.dual - rhs.dual,
        }
    }
}

impl Mul for Dual {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self {
            real: self.real * rhs.real,
            dual: self.dual * rhs.real + self.real * rhs.dual,
        }
    }
}

impl Div for Dual {
    type Output = Self;

    fn div(self, rhs: Self) -> Self {
        Self {
            real: self.real / rhs.real,
            dual: (self.dual * rhs.real - self.real * rhs.dual) / (rhs.real * rhs.real),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn quotient_rule() {
        // d/dx (x / 4) at x = 2 and d/dx (4 / x) at x = 2.
        let x = Dual::seed(2.);
        let four = Dual::constant(4.);

        assert!(close((x / four).dual, 0.25));
        assert!(close((four / x).dual, -1.));
    }

    #[test]
    fn pow_differentiates_base_and_exponent() {
        let x = Dual::seed(3.);
        assert!(close(x.pow(Dual::constant(2.)).dual, 6.));

        // d/dx 2^x = 2^x ln 2
        let two = Dual::constant(2.);
        assert!(close(two.pow(x).dual, 8. * 2f32.ln()));

        let neg = Dual::seed(-2.);
        assert!(close(neg.pow(Dual::constant(3.)).dual, 12.));
    }

    #[test]
    fn unary_functions() {
        let x = Dual::seed(0.);
        assert!(close(x.logistic().dual, 0.25));
        assert!(close(x.tanh().dual, 1.));
        assert!(close(x.exp().dual, 1.));

        let x = Dual::seed(4.);
        assert!(close(x.sqrt().dual, 0.25));
        assert!(close(x.ln().dual, 0.25));
    }
}
