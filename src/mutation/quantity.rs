//! Exact arithmetic over Kubernetes resource quantities.
//!
//! `k8s-openapi` models a quantity as its serialized string. Reductions have
//! to be computed on the scaled integer value and printed back in the
//! canonical form the API server would produce, so this module parses a
//! quantity into a count of milli-units plus the format its suffix implies.
//!
//! Accepted grammar:
//! ```text
//! <quantity>        ::= <signedNumber><suffix>
//! <suffix>          ::= <binarySI> | <decimalExponent> | <decimalSI>
//! <binarySI>        ::= Ki | Mi | Gi | Ti | Pi | Ei
//! <decimalSI>       ::= n | u | m | "" | k | M | G | T | P | E
//! <decimalExponent> ::= "e" <signedNumber> | "E" <signedNumber>
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use regex::Regex;
use thiserror::Error;

// Pattern: ^(sign)(whole)(.fraction)?(suffix)$
static NUMBER_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^([+-]?)([0-9]*)(?:\.([0-9]*))?(.*)$").ok());

/// Errors that can occur while parsing or scaling a quantity.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuantityError {
    #[error("invalid quantity {0:?}")]
    Invalid(String),

    #[error("quantity {0:?} overflows the milli-unit range")]
    Overflow(String),
}

/// Display format of a quantity, preserved through arithmetic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QuantityFormat {
    /// Powers of 1000 (`m`, `k`, `M`, ...)
    DecimalSI,
    /// Powers of 1024 (`Ki`, `Mi`, ...)
    BinarySI,
    /// Scientific notation (`1e3`)
    DecimalExponent,
}

/// A quantity held as an exact count of milli-units.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MilliQuantity {
    milli: i64,
    format: QuantityFormat,
}

const DECIMAL_SUFFIXES: &[(&str, i32)] = &[
    ("n", -9),
    ("u", -6),
    ("m", -3),
    ("", 0),
    ("k", 3),
    ("M", 6),
    ("G", 9),
    ("T", 12),
    ("P", 15),
    ("E", 18),
];

const BINARY_SUFFIXES: &[(&str, u32)] = &[
    ("", 0),
    ("Ki", 1),
    ("Mi", 2),
    ("Gi", 3),
    ("Ti", 4),
    ("Pi", 5),
    ("Ei", 6),
];

/// Split a suffix into its base-10 exponent, power of 1024 and format.
fn parse_suffix(input: &str, suffix: &str) -> Result<(i32, u32, QuantityFormat), QuantityError> {
    if let Some((_, exponent)) = DECIMAL_SUFFIXES.iter().find(|(s, _)| *s == suffix) {
        return Ok((*exponent, 0, QuantityFormat::DecimalSI));
    }
    if let Some((_, power)) = BINARY_SUFFIXES.iter().find(|(s, _)| *s == suffix) {
        return Ok((0, *power, QuantityFormat::BinarySI));
    }

    let exponent = suffix
        .strip_prefix(['e', 'E'])
        .and_then(|exp| exp.parse::<i32>().ok())
        .ok_or_else(|| QuantityError::Invalid(input.to_string()))?;
    Ok((exponent, 0, QuantityFormat::DecimalExponent))
}

impl MilliQuantity {
    /// Create a quantity from a milli-unit count.
    pub fn from_milli(milli: i64, format: QuantityFormat) -> Self {
        Self { milli, format }
    }

    /// Create a quantity from a whole-unit count (bytes, cores, ...).
    pub fn from_units(units: i64, format: QuantityFormat) -> Result<Self, QuantityError> {
        let milli = units
            .checked_mul(1000)
            .ok_or_else(|| QuantityError::Overflow(units.to_string()))?;
        Ok(Self { milli, format })
    }

    /// Parse a quantity string.
    ///
    /// Precision finer than one milli-unit is rounded away from zero, so
    /// `1n` parses to one milli-unit.
    pub fn parse(input: &str) -> Result<Self, QuantityError> {
        let invalid = || QuantityError::Invalid(input.to_string());
        let overflow = || QuantityError::Overflow(input.to_string());

        let caps = NUMBER_RE
            .as_ref()
            .and_then(|re| re.captures(input))
            .ok_or_else(invalid)?;
        let negative = caps.get(1).is_some_and(|m| m.as_str() == "-");
        let whole = caps.get(2).map_or("", |m| m.as_str());
        let fraction = caps.get(3).map_or("", |m| m.as_str());
        let suffix = caps.get(4).map_or("", |m| m.as_str());

        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }

        let (exponent, power, format) = parse_suffix(input, suffix)?;

        let digits = format!("{whole}{fraction}");
        let digits = digits.trim_start_matches('0');
        let mantissa: i128 = if digits.is_empty() {
            0
        } else {
            digits.parse().map_err(|_| overflow())?
        };

        let fraction_len = i32::try_from(fraction.len()).map_err(|_| overflow())?;
        // Shift to milli-units: value = mantissa * 1024^power * 10^scale
        let scale = exponent
            .checked_sub(fraction_len)
            .and_then(|s| s.checked_add(3))
            .ok_or_else(overflow)?;

        let value = mantissa
            .checked_mul(1024i128.pow(power))
            .ok_or_else(overflow)?;

        let milli = if value == 0 {
            0
        } else if scale >= 0 {
            10i128
                .checked_pow(scale.unsigned_abs())
                .and_then(|factor| value.checked_mul(factor))
                .ok_or_else(overflow)?
        } else {
            match 10i128.checked_pow(scale.unsigned_abs()) {
                Some(divisor) => value / divisor + i128::from(value % divisor != 0),
                None => 1,
            }
        };

        let milli = if negative { -milli } else { milli };
        let milli = i64::try_from(milli).map_err(|_| overflow())?;

        Ok(Self { milli, format })
    }

    /// The value in milli-units.
    pub fn milli_value(&self) -> i64 {
        self.milli
    }

    /// The display format.
    pub fn format(&self) -> QuantityFormat {
        self.format
    }

    /// Scale by `percent / 100`, rounding down at milli precision.
    pub fn percent(&self, percent: i64) -> Result<Self, QuantityError> {
        let scaled = i128::from(self.milli) * i128::from(percent);
        let milli = i64::try_from(scaled.div_euclid(100))
            .map_err(|_| QuantityError::Overflow(self.to_string()))?;
        Ok(Self {
            milli,
            format: self.format,
        })
    }

    /// Convert to the `k8s-openapi` representation.
    pub fn to_quantity(&self) -> Quantity {
        Quantity(self.to_string())
    }
}

impl fmt::Display for MilliQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.milli == 0 {
            return f.write_str("0");
        }

        // Binary form only for whole units of at least 1Ki; anything else would
        // lose precision and falls back to decimal.
        if self.format == QuantityFormat::BinarySI
            && self.milli.unsigned_abs() >= 1_024_000
            && self.milli % 1000 == 0
        {
            let mut units = self.milli / 1000;
            let mut power = 0;
            while power < 6 && units % 1024 == 0 {
                units /= 1024;
                power += 1;
            }
            let suffix = BINARY_SUFFIXES
                .iter()
                .find(|(_, p)| *p == power)
                .map_or("", |(s, _)| *s);
            return write!(f, "{units}{suffix}");
        }

        let mut mantissa = i128::from(self.milli);
        let mut exponent: i32 = -3;
        while mantissa % 10 == 0 {
            mantissa /= 10;
            exponent += 1;
        }
        let adjust = exponent.rem_euclid(3);
        mantissa *= 10i128.pow(adjust.unsigned_abs());
        exponent -= adjust;

        let suffix = match self.format {
            QuantityFormat::DecimalExponent => None,
            _ => DECIMAL_SUFFIXES
                .iter()
                .find(|(_, e)| *e == exponent)
                .map(|(s, _)| *s),
        };

        match suffix {
            Some(suffix) => write!(f, "{mantissa}{suffix}"),
            None if exponent == 0 => write!(f, "{mantissa}"),
            None => write!(f, "{mantissa}e{exponent}"),
        }
    }
}

impl FromStr for MilliQuantity {
    type Err = QuantityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&Quantity> for MilliQuantity {
    type Error = QuantityError;

    fn try_from(quantity: &Quantity) -> Result<Self, Self::Error> {
        Self::parse(&quantity.0)
    }
}
