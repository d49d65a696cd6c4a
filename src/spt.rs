//! Conversion between numeric spectral types and strings such as `sdL3.5p:`.
//!
//! Numeric scale: K0 = 0, M0 = 10, L0 = 20, T0 = 30, Y0 = 40.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SplatError};

/// Class letters in numeric order, ten subtypes each.
pub const CLASS_LETTERS: [char; 5] = ['K', 'M', 'L', 'T', 'Y'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subclass {
    /// Subdwarf.
    Sd,
    /// Extreme subdwarf.
    Esd,
    /// Ultra subdwarf.
    Usd,
}

impl Subclass {
    pub fn as_str(self) -> &'static str {
        match self {
            Subclass::Sd => "sd",
            Subclass::Esd => "esd",
            Subclass::Usd => "usd",
        }
    }
}

/// Classification uncertainty markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Uncertainty {
    /// `:`
    Uncertain,
    /// `::`
    VeryUncertain,
}

impl Uncertainty {
    pub fn as_str(self) -> &'static str {
        match self {
            Uncertainty::Uncertain => ":",
            Uncertainty::VeryUncertain => "::",
        }
    }

    /// Marker implied by a numeric uncertainty in subtypes.
    pub fn from_subtypes(unc: f64) -> Option<Self> {
        if unc > 2.0 {
            Some(Uncertainty::VeryUncertain)
        } else if unc > 1.0 {
            Some(Uncertainty::Uncertain)
        } else {
            None
        }
    }
}

/// Everything in a spectral-type string besides the number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeFlags {
    /// Leading `b` (blue) or `r` (red).
    pub color_class: Option<char>,
    pub subclass: Option<Subclass>,
    /// Gravity/age letter `a`..`d` following the subtype.
    pub age_class: Option<char>,
    /// Luminosity class written as a run of `I`.
    pub luminosity_class: Option<String>,
    pub peculiar: bool,
    pub uncertainty: Option<Uncertainty>,
}

/// A decoded spectral type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectralType {
    pub number: f64,
    pub flags: TypeFlags,
}

impl SpectralType {
    /// Render back to a string, keeping the decoded flags.
    pub fn to_type_string(&self) -> Result<String> {
        type_to_string(self.number, 0.0, &self.flags)
    }
}

impl FromStr for SpectralType {
    type Err = SplatError;

    fn from_str(s: &str) -> Result<Self> {
        parse_spectral_type(s)
    }
}

// ---------------------------------------------------------------------------
// number -> string
// ---------------------------------------------------------------------------

/// Format `spt` as a type string with one decimal subtype.
///
/// `uncertainty` above 1 (2) subtypes appends `:` (`::`); otherwise the
/// marker in `flags` is used.
pub fn type_to_string(spt: f64, uncertainty: f64, flags: &TypeFlags) -> Result<String> {
    if !spt.is_finite() || spt < 0.0 {
        return Err(SplatError::OutOfRangeSpectralType(spt));
    }
    let rounded = (spt * 10.0).round_ties_even() / 10.0;
    let class = (rounded / 10.0).floor() as usize;
    let Some(letter) = CLASS_LETTERS.get(class) else {
        return Err(SplatError::OutOfRangeSpectralType(spt));
    };
    let subtype = rounded - 10.0 * class as f64;

    let mut out = String::new();
    if let Some(c) = flags.color_class {
        out.push(c);
    }
    if let Some(sub) = flags.subclass {
        out.push_str(sub.as_str());
    }
    out.push(*letter);
    out.push_str(&format!("{subtype:.1}"));
    if let Some(age) = flags.age_class {
        out.push(age);
    }
    if let Some(lum) = &flags.luminosity_class {
        out.push_str(lum);
    }
    if flags.peculiar {
        out.push('p');
    }
    if let Some(marker) = Uncertainty::from_subtypes(uncertainty).or(flags.uncertainty) {
        out.push_str(marker.as_str());
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// string -> number
// ---------------------------------------------------------------------------

/// Decode a type string.
///
/// There must be exactly one class letter, followed by a subtype digit with an
/// optional decimal fraction. Flags are picked up by independent scans, so
/// their position in the string does not matter.
pub fn parse_spectral_type(input: &str) -> Result<SpectralType> {
    let unparseable = || SplatError::UnparseableSpectralType(input.to_string());

    let mut letters = input
        .char_indices()
        .filter_map(|(i, c)| CLASS_LETTERS.iter().position(|&l| l == c).map(|class| (i, class)));
    let (pos, class) = letters.next().ok_or_else(unparseable)?;
    if letters.next().is_some() {
        return Err(unparseable());
    }

    // Letters are ASCII, so the subtype starts one byte later.
    let rest = &input[pos + 1..];
    let bytes = rest.as_bytes();
    if !bytes.first().is_some_and(u8::is_ascii_digit) {
        return Err(unparseable());
    }
    let mut end = 1;
    if bytes.get(1) == Some(&b'.') {
        end = 2;
        while bytes.get(end).is_some_and(u8::is_ascii_digit) {
            end += 1;
        }
    }
    let subtype: f64 = rest[..end].parse().map_err(|_| unparseable())?;
    let suffix = &rest[end..];

    let subclass = if input.contains("usd") {
        Some(Subclass::Usd)
    } else if input.contains("esd") {
        Some(Subclass::Esd)
    } else if input.contains("sd") {
        Some(Subclass::Sd)
    } else {
        None
    };

    let lum: String = input.chars().filter(|&c| c == 'I').collect();
    let uncertainty = match input.matches(':').count() {
        0 => None,
        1 => Some(Uncertainty::Uncertain),
        _ => Some(Uncertainty::VeryUncertain),
    };

    let mut ages = suffix.chars().filter(|c| matches!(c, 'a'..='d'));
    let age_class = match (ages.next(), ages.next()) {
        (Some(age), None) => Some(age),
        _ => None,
    };

    let color_class = input.chars().next().filter(|c| matches!(c, 'b' | 'r'));

    Ok(SpectralType {
        number: 10.0 * class as f64 + subtype,
        flags: TypeFlags {
            color_class,
            subclass,
            age_class,
            luminosity_class: (!lum.is_empty()).then_some(lum),
            peculiar: input.contains('p'),
            uncertainty,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn parses_peculiar_l_dwarf() {
        let t: SpectralType = "L3.5p".parse().unwrap();
        assert_abs_diff_eq!(t.number, 23.5);
        assert!(t.flags.peculiar);
        assert_eq!(t.flags.subclass, None);
        assert_eq!(t.flags.age_class, None);
    }

    #[test]
    fn parses_subdwarf() {
        let t = parse_spectral_type("sdM5.0").unwrap();
        assert_abs_diff_eq!(t.number, 15.0);
        assert_eq!(t.flags.subclass, Some(Subclass::Sd));
        assert_eq!(t.flags.age_class, None);
        assert_eq!(t.flags.color_class, None);

        assert_eq!(
            parse_spectral_type("esdK7").unwrap().flags.subclass,
            Some(Subclass::Esd)
        );
        assert_eq!(
            parse_spectral_type("usdM1.5").unwrap().flags.subclass,
            Some(Subclass::Usd)
        );
    }

    #[test]
    fn picks_up_independent_flags() {
        let t = parse_spectral_type("bT2::").unwrap();
        assert_abs_diff_eq!(t.number, 32.0);
        assert_eq!(t.flags.color_class, Some('b'));
        assert_eq!(t.flags.uncertainty, Some(Uncertainty::VeryUncertain));

        let t = parse_spectral_type("M7.5bIII:").unwrap();
        assert_abs_diff_eq!(t.number, 17.5);
        assert_eq!(t.flags.age_class, Some('b'));
        assert_eq!(t.flags.luminosity_class.as_deref(), Some("III"));
        assert_eq!(t.flags.uncertainty, Some(Uncertainty::Uncertain));
        assert!(!t.flags.peculiar);
    }

    #[test]
    fn rejects_zero_or_many_letters() {
        for bad in ["", "G2V", "5.5", "LT", "M9/L0", "L"] {
            assert!(
                matches!(
                    parse_spectral_type(bad),
                    Err(SplatError::UnparseableSpectralType(_))
                ),
                "{bad:?} should not parse"
            );
        }
    }

    #[test]
    fn formats_with_uncertainty_markers() {
        let flags = TypeFlags::default();
        assert_eq!(type_to_string(23.5, 0.5, &flags).unwrap(), "L3.5");
        assert_eq!(type_to_string(23.5, 1.5, &flags).unwrap(), "L3.5:");
        assert_eq!(type_to_string(23.5, 2.5, &flags).unwrap(), "L3.5::");
        assert_eq!(type_to_string(0.0, 0.0, &flags).unwrap(), "K0.0");
        assert_eq!(type_to_string(39.94, 0.0, &flags).unwrap(), "T9.9");
    }

    #[test]
    fn formats_flags_in_order() {
        let flags = TypeFlags {
            color_class: Some('r'),
            subclass: Some(Subclass::Sd),
            age_class: Some('g'),
            luminosity_class: None,
            peculiar: true,
            uncertainty: Some(Uncertainty::Uncertain),
        };
        assert_eq!(type_to_string(12.0, 0.0, &flags).unwrap(), "rsdM2.0gp:");
    }

    #[test]
    fn rejects_out_of_range_numbers() {
        let flags = TypeFlags::default();
        for bad in [-1.0, 50.0, 62.0, f64::NAN] {
            assert!(matches!(
                type_to_string(bad, 0.0, &flags),
                Err(SplatError::OutOfRangeSpectralType(_))
            ));
        }
    }

    #[test]
    fn numbers_round_trip_through_strings() {
        let flags = TypeFlags::default();
        for i in 0..=490 {
            let spt = i as f64 * 0.1 + 0.03;
            let s = type_to_string(spt, 0.0, &flags).unwrap();
            let back = parse_spectral_type(&s).unwrap().number;
            assert!((back - spt).abs() <= 0.1, "{spt} -> {s} -> {back}");
        }
    }

    #[test]
    fn decoded_type_re_renders() {
        let t = parse_spectral_type("sdL4.0p:").unwrap();
        assert_eq!(t.to_type_string().unwrap(), "sdL4.0p:");
    }
}
