use itertools::Itertools;
use std::{fmt, str::FromStr};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SpecError {
    #[error("Mixture specification is empty")]
    Empty,
    #[error("Names and fractions do not match ({names} names, {fractions} fractions)")]
    CountMismatch { names: usize, fractions: usize },
    #[error("Fraction '{0}' is not a number")]
    InvalidFraction(String),
    #[error("Fraction of {name} must be a finite, non-negative number, got {fraction}")]
    NegativeFraction { name: String, fraction: f64 },
}

/// A single gas component with its fraction in percent
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub name: String,
    pub fraction: f64,
}

/// Validated mixture specification, e.g. `C4H10 0.5 Ar`
///
/// The raw tokens are kept around since they are passed through to the
/// simulation CLI verbatim, while the canonical name is only used for paths.
#[derive(Debug, Clone, PartialEq)]
pub struct Mixture {
    tokens: Vec<String>,
    components: Vec<Component>,
}

impl Mixture {
    /// Parse alternating `name fraction` tokens, fractions are in percent
    ///
    /// Only a binary mixture may leave out its trailing fraction, which is then
    /// `100 - first`, e.g. `C4H10 0.5 Ar`. With three or more components every
    /// fraction has to be given, `A 10 B 20 C` is a `CountMismatch`.
    pub fn parse(spec: &str) -> Result<Self, SpecError> {
        let tokens = spec.split_whitespace().map(String::from).collect_vec();

        if tokens.is_empty() {
            return Err(SpecError::Empty);
        }

        let names = tokens.iter().step_by(2).cloned().collect_vec();
        let mut fractions = tokens
            .iter()
            .skip(1)
            .step_by(2)
            .map(|token| match token.parse::<f64>() {
                Ok(value) if value.is_finite() => Ok(value),
                _ => Err(SpecError::InvalidFraction(token.clone())),
            })
            .collect::<Result<Vec<_>, _>>()?;

        // a trailing fraction is only inferred for binary mixtures (carrier + quencher),
        // anything with three or more components has to be spelled out in full
        if names.len() <= 2 && names.len() == fractions.len() + 1 {
            fractions.push(100.0 - fractions.iter().sum::<f64>());
        }

        if names.len() != fractions.len() {
            return Err(SpecError::CountMismatch {
                names: names.len(),
                fractions: fractions.len(),
            });
        }

        let components = names
            .into_iter()
            .zip(fractions)
            .map(|(name, fraction)| {
                if fraction < 0.0 {
                    Err(SpecError::NegativeFraction { name, fraction })
                } else {
                    Ok(Component { name, fraction })
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { tokens, components })
    }

    /// tokens as given by the user, in input order
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Canonical, input order independent name of the mixture
    ///
    /// Components are ordered by descending fraction, ties are broken by name.
    /// A pure component is named after itself without a fraction.
    pub fn canonical_name(&self) -> String {
        if let [single] = self.components.as_slice() {
            return single.name.clone();
        }

        self.components
            .iter()
            .sorted_by(|a, b| {
                b.fraction
                    .total_cmp(&a.fraction)
                    .then_with(|| a.name.cmp(&b.name))
            })
            .map(|component| format!("{}_{}", component.name, clean_fraction(component.fraction)))
            .join("-")
    }
}

impl FromStr for Mixture {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Mixture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tokens.join(" "))
    }
}

/// shorthand for `Mixture::parse(spec)?.canonical_name()`
pub fn canonical_name(spec: &str) -> Result<String, SpecError> {
    Mixture::parse(spec).map(|mixture| mixture.canonical_name())
}

/// format with three decimals, drop trailing zeros but keep one digit after the point
fn clean_fraction(fraction: f64) -> String {
    let formatted = format!("{fraction:.3}");
    let mut cleaned = formatted.trim_end_matches('0').to_string();

    if cleaned.ends_with('.') {
        cleaned.push('0');
    }

    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn infers_carrier_fraction() {
        assert_eq!(canonical_name("C4H10 0.5 Ar").unwrap(), "Ar_99.5-C4H10_0.5");
    }

    #[test]
    fn ties_are_sorted_by_name() {
        assert_eq!(canonical_name("X 50 Y 50").unwrap(), "X_50.0-Y_50.0");
        assert_eq!(canonical_name("Y 50 X 50").unwrap(), "X_50.0-Y_50.0");
    }

    #[test]
    fn pure_gas_uses_bare_name() {
        assert_eq!(canonical_name("Ar").unwrap(), "Ar");
        assert_eq!(canonical_name("Ar 100").unwrap(), "Ar");
    }

    #[test]
    fn fractions_keep_significant_digits() {
        assert_eq!(
            canonical_name("A 33.333 B 33.333 C 33.334").unwrap(),
            "C_33.334-A_33.333-B_33.333"
        );
        assert_eq!(clean_fraction(50.0), "50.0");
        assert_eq!(clean_fraction(2.3), "2.3");
        assert_eq!(clean_fraction(0.0125), "0.013");
    }

    #[test]
    fn binary_mixture_with_missing_fraction_is_valid() {
        let mixture = Mixture::parse("A 10 B").unwrap();

        assert_eq!(mixture.components()[1].fraction, 90.0);
        assert_eq!(mixture.canonical_name(), "B_90.0-A_10.0");
    }

    #[test]
    fn rejects_mismatched_counts() {
        assert_eq!(
            Mixture::parse("A 10 B 20 C"),
            Err(SpecError::CountMismatch {
                names: 3,
                fractions: 2
            })
        );
        assert!(matches!(
            Mixture::parse("A 10 B 20 C 30 D"),
            Err(SpecError::CountMismatch { .. })
        ));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(Mixture::parse("   "), Err(SpecError::Empty));
        assert_eq!(
            Mixture::parse("Ar ten"),
            Err(SpecError::InvalidFraction("ten".into()))
        );
        assert!(matches!(
            Mixture::parse("Ar 120 CO2"),
            Err(SpecError::NegativeFraction { .. })
        ));
    }

    #[test]
    fn keeps_tokens_verbatim() {
        let mixture: Mixture = "C4H10  0.5 Ar".parse().unwrap();

        assert_eq!(mixture.tokens(), ["C4H10", "0.5", "Ar"]);
        assert_eq!(mixture.to_string(), "C4H10 0.5 Ar");
    }

    proptest! {
        #[test]
        fn name_is_invariant_under_reordering(
            fractions in proptest::collection::vec(0u32..10_000, 2..6),
            rotation in 0usize..6,
        ) {
            let pairs = fractions
                .iter()
                .enumerate()
                .map(|(i, fraction)| format!("G{i} {}", *fraction as f64 / 100.0))
                .collect_vec();

            let mut rotated = pairs.clone();
            let len = rotated.len();
            rotated.rotate_left(rotation % len);
            rotated.reverse();

            prop_assert_eq!(
                canonical_name(&pairs.join(" ")).unwrap(),
                canonical_name(&rotated.join(" ")).unwrap()
            );
        }
    }
}
