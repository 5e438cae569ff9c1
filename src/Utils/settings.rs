//! Solver settings document: titled sections of `key: value` pairs
//! ```text
//! // deadlines in seconds
//! integration
//!   timeout: 30 fallback_timeout: 5
//!   max_depth: 10
//! polar
//!   intersection_samples: 4000
//!   ops_threshold: 20
//!   cartesian_max_panels: 64
//! ```
//! Lines starting with `//`, `#` or `%` are comments. Keys left out keep their defaults.
use crate::numerical::polar_area::PolarConfig;
use crate::solver::supervisor::SolverConfig;
use log::info;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{alpha1, alphanumeric1, multispace0, space0},
    combinator::{map, recognize},
    multi::{many0, many1},
    sequence::{delimited, pair, separated_pair, terminated},
};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("could not read settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse settings document near '{0}'")]
    Syntax(String),
    #[error("unknown section '{0}'")]
    UnknownSection(String),
    #[error("unknown key '{key}' in section '{section}'")]
    UnknownKey { section: String, key: String },
    #[error("invalid value '{value}' for '{key}': expected {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolverSettings {
    pub integration: SolverConfig,
    pub polar: PolarConfig,
}

pub type Section = (String, Vec<(String, String)>);

fn identifier(input: &str) -> IResult<&str, String> {
    map(
        recognize(pair(
            alt((alpha1, tag("_"))),
            many0(alt((alphanumeric1, tag("_")))),
        )),
        String::from,
    )
    .parse(input)
}

fn raw_value(input: &str) -> IResult<&str, String> {
    map(
        take_while1(|c: char| !c.is_whitespace() && c != ','),
        String::from,
    )
    .parse(input)
}

fn key_value(input: &str) -> IResult<&str, (String, String)> {
    separated_pair(identifier, delimited(space0, tag(":"), space0), raw_value).parse(input)
}

fn section(input: &str) -> IResult<&str, Section> {
    let (input, title) = terminated(identifier, multispace0).parse(input)?;
    let (input, pairs) = many1(terminated(key_value, multispace0)).parse(input)?;
    Ok((input, (title, pairs)))
}

fn strip_comments(input: &str) -> String {
    input
        .lines()
        .map(str::trim)
        .filter(|line| {
            !line.is_empty()
                && !line.starts_with("//")
                && !line.starts_with('#')
                && !line.starts_with('%')
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Sections in document order, values kept as text.
pub fn parse_sections(document: &str) -> Result<Vec<Section>, SettingsError> {
    let text = strip_comments(document);
    if text.is_empty() {
        return Ok(Vec::new());
    }
    let parsed = many1(delimited(multispace0, section, multispace0)).parse(text.as_str());
    match parsed {
        Ok((rest, sections)) if rest.trim().is_empty() => Ok(sections),
        Ok((rest, _)) => Err(SettingsError::Syntax(rest.chars().take(40).collect())),
        Err(_) => Err(SettingsError::Syntax(text.chars().take(40).collect())),
    }
}

fn number<T: std::str::FromStr>(key: &str, value: &str, expected: &'static str) -> Result<T, SettingsError> {
    value.parse::<T>().map_err(|_| SettingsError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        expected,
    })
}

fn seconds(key: &str, value: &str) -> Result<Duration, SettingsError> {
    let secs: f64 = number(key, value, "a non-negative number of seconds")?;
    Duration::try_from_secs_f64(secs).map_err(|_| SettingsError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        expected: "a non-negative number of seconds",
    })
}

fn unknown(section: &str, key: &str) -> SettingsError {
    SettingsError::UnknownKey {
        section: section.to_string(),
        key: key.to_string(),
    }
}

impl SolverConfig {
    fn apply(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        const COUNT: &str = "a non-negative integer";
        match key {
            "timeout" => self.timeout = seconds(key, value)?,
            "fallback_timeout" => self.fallback_timeout = seconds(key, value)?,
            "max_depth" => self.max_depth = number(key, value, COUNT)?,
            "max_candidates" => self.max_candidates = number(key, value, COUNT)?,
            _ => return Err(unknown("integration", key)),
        }
        Ok(())
    }
}

impl PolarConfig {
    fn apply(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        const COUNT: &str = "a non-negative integer";
        const REAL: &str = "a number";
        match key {
            "intersection_samples" => self.intersection_samples = number(key, value, COUNT)?,
            "crossing_samples" => self.crossing_samples = number(key, value, COUNT)?,
            "bounding_samples" => self.bounding_samples = number(key, value, COUNT)?,
            "side_tolerance" => self.side_tolerance = number(key, value, REAL)?,
            "root_tolerance" => self.root_tolerance = number(key, value, REAL)?,
            "dominance_tolerance" => self.dominance_tolerance = number(key, value, REAL)?,
            "radius_tolerance" => self.radius_tolerance = number(key, value, REAL)?,
            "ops_threshold" => self.ops_threshold = number(key, value, COUNT)?,
            "seam_epsilon" => self.seam_epsilon = number(key, value, REAL)?,
            "warn_error" => self.warn_error = number(key, value, REAL)?,
            "max_error" => self.max_error = number(key, value, REAL)?,
            "polar_order" => self.polar_quadrature.order = number(key, value, COUNT)?,
            "polar_max_panels" => self.polar_quadrature.max_panels = number(key, value, COUNT)?,
            "polar_tolerance" => {
                let tol: f64 = number(key, value, REAL)?;
                self.polar_quadrature.abs_tolerance = tol;
                self.polar_quadrature.rel_tolerance = tol;
            }
            "cartesian_order" => self.cartesian_quadrature.order = number(key, value, COUNT)?,
            "cartesian_max_panels" => {
                self.cartesian_quadrature.max_panels = number(key, value, COUNT)?
            }
            "cartesian_tolerance" => {
                let tol: f64 = number(key, value, REAL)?;
                self.cartesian_quadrature.abs_tolerance = tol;
                self.cartesian_quadrature.rel_tolerance = tol;
            }
            _ => return Err(unknown("polar", key)),
        }
        Ok(())
    }
}

impl SolverSettings {
    pub fn from_document(document: &str) -> Result<Self, SettingsError> {
        let mut settings = Self::default();
        for (title, pairs) in parse_sections(document)? {
            for (key, value) in pairs {
                match title.as_str() {
                    "integration" => settings.integration.apply(&key, &value)?,
                    "polar" => settings.polar.apply(&key, &value)?,
                    _ => return Err(SettingsError::UnknownSection(title)),
                }
            }
        }
        Ok(settings)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let document = std::fs::read_to_string(path.as_ref())?;
        info!("settings loaded from {}", path.as_ref().display());
        Self::from_document(&document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const DOCUMENT: &str = "
        // deadlines in seconds
        integration
          timeout: 30 fallback_timeout: 2.5
          max_depth: 8
        # numeric engine
        polar
          intersection_samples: 4000
          ops_threshold: 20
          cartesian_tolerance: 1e-6
    ";

    #[test]
    fn test_sections_keep_document_order() {
        let sections = parse_sections(DOCUMENT).unwrap();
        let titles: Vec<&str> = sections.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(titles, ["integration", "polar"]);
        assert_eq!(
            sections[0].1[1],
            ("fallback_timeout".to_string(), "2.5".to_string())
        );
    }

    #[test]
    fn test_document_overrides_defaults() {
        let settings = SolverSettings::from_document(DOCUMENT).unwrap();
        assert_eq!(settings.integration.timeout, Duration::from_secs(30));
        assert_eq!(settings.integration.fallback_timeout, Duration::from_millis(2500));
        assert_eq!(settings.integration.max_depth, 8);
        assert_eq!(
            settings.integration.max_candidates,
            SolverConfig::default().max_candidates
        );
        assert_eq!(settings.polar.intersection_samples, 4000);
        assert_eq!(settings.polar.ops_threshold, 20);
        assert_eq!(settings.polar.cartesian_quadrature.rel_tolerance, 1e-6);
        assert_eq!(settings.polar.crossing_samples, 1000);
    }

    #[test]
    fn test_empty_document_is_default() {
        let settings = SolverSettings::from_document("% nothing here\n").unwrap();
        assert_eq!(settings, SolverSettings::default());
    }

    #[test]
    fn test_rejected_documents() {
        assert!(matches!(
            SolverSettings::from_document("plots\n width: 3"),
            Err(SettingsError::UnknownSection(_))
        ));
        assert!(matches!(
            SolverSettings::from_document("integration\n depth: 3"),
            Err(SettingsError::UnknownKey { .. })
        ));
        assert!(matches!(
            SolverSettings::from_document("polar\n ops_threshold: many"),
            Err(SettingsError::InvalidValue { .. })
        ));
        assert!(matches!(
            SolverSettings::from_document("integration\n timeout: -1"),
            Err(SettingsError::InvalidValue { .. })
        ));
        assert!(matches!(
            SolverSettings::from_document("integration timeout 3"),
            Err(SettingsError::Syntax(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "integration\n max_candidates: 4").unwrap();
        let settings = SolverSettings::from_file(file.path()).unwrap();
        assert_eq!(settings.integration.max_candidates, 4);
        assert!(SolverSettings::from_file("/definitely/not/here.txt").is_err());
    }
}
