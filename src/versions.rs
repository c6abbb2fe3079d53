//! Version listing and exact-version lookup over a stemcell catalog.
//!
//! Catalog versions are loosely formatted (`"3262"`, `"3262.4"`,
//! `"3262.4.1"`), so every comparison goes through [`parse_tolerant`], which
//! pads missing components with zero before handing the string to `semver`.

use crate::catalog::filter_by_type;
use crate::error::{Result, StemcellError};
use crate::types::{SelectionPreference, StemcellRecord, VersionFilter};
use semver::Version;
use tracing::debug;

/// Family value that disables family filtering.
pub const LATEST_FAMILY: &str = "latest";

/// Parses a possibly abbreviated version string.
///
/// Surrounding whitespace and a leading `v` are ignored, leading zeros are
/// dropped from each component, and missing minor/patch components default
/// to zero. Abbreviated versions may not carry pre-release or build metadata.
///
/// # Example
///
/// ```
/// use stemcell_fetch::versions::parse_tolerant;
///
/// assert_eq!(parse_tolerant("3262.4").unwrap(), semver::Version::new(3262, 4, 0));
/// assert_eq!(parse_tolerant("v0097").unwrap(), semver::Version::new(97, 0, 0));
/// assert!(parse_tolerant("3262.x").is_err());
/// ```
pub fn parse_tolerant(value: &str) -> Result<Version> {
    let invalid = |reason: String| StemcellError::InvalidVersion {
        value: value.to_string(),
        reason,
    };

    let trimmed = value.trim();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);

    let mut parts: Vec<String> = trimmed
        .splitn(3, '.')
        .map(|part| {
            if part.len() < 2 {
                return part.to_string();
            }
            let stripped = part.trim_start_matches('0');
            if stripped.starts_with(|c: char| c.is_ascii_digit()) {
                stripped.to_string()
            } else {
                format!("0{}", stripped)
            }
        })
        .collect();

    if parts.len() < 3 {
        if trimmed.contains(|c| c == '+' || c == '-') {
            return Err(invalid(
                "short version cannot contain pre-release or build metadata".to_string(),
            ));
        }
        parts.resize(3, "0".to_string());
    }

    Version::parse(&parts.join(".")).map_err(|e| invalid(e.to_string()))
}

/// Half-open version range `[floor, ceiling)` selected by a family prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FamilyRange {
    floor: Version,
    ceiling: Version,
}

impl FamilyRange {
    /// Builds the range for `family`. The number of dot-separated components
    /// decides which component of the floor is incremented for the ceiling.
    fn parse(family: &str) -> Result<Self> {
        let floor = parse_tolerant(family)?;
        let components = family.matches('.').count() + 1;

        let ceiling = match components {
            1 => Version::new(floor.major + 1, 0, 0),
            2 => Version::new(floor.major, floor.minor + 1, 0),
            _ => Version::new(floor.major, floor.minor, floor.patch + 1),
        };

        Ok(Self { floor, ceiling })
    }

    fn contains(&self, version: &Version) -> bool {
        *version >= self.floor && *version < self.ceiling
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Lists the catalog versions matching `filter`, ascending.
///
/// Records are first restricted to one variant type (see
/// [`filter_by_type`]), then to the requested family. Without a minimum
/// version only the latest match is returned; with one, every match at or
/// above it. An empty catalog yields an empty list.
///
/// # Errors
///
/// Any unparsable version, whether from the catalog, the family or the
/// minimum version, fails the whole listing.
pub fn list_versions(
    records: &[StemcellRecord],
    preference: SelectionPreference,
    filter: &VersionFilter,
) -> Result<Vec<String>> {
    let typed = filter_by_type(records, preference);
    if typed.is_empty() {
        return Ok(Vec::new());
    }

    let mut versions = typed
        .iter()
        .map(|record| Ok((parse_tolerant(&record.version)?, record.version.as_str())))
        .collect::<Result<Vec<(Version, &str)>>>()?;

    if let Some(family) = non_empty(&filter.family).filter(|f| *f != LATEST_FAMILY) {
        let range = FamilyRange::parse(family)?;
        versions.retain(|(parsed, _)| range.contains(parsed));
        debug!(
            "Family {} keeps {} versions in [{}, {})",
            family,
            versions.len(),
            range.floor,
            range.ceiling
        );
    }

    versions.sort_by(|(a, _), (b, _)| a.cmp(b));

    let selected: Vec<String> = match non_empty(&filter.minimum_version) {
        None => versions
            .last()
            .map(|(_, raw)| vec![raw.to_string()])
            .unwrap_or_default(),
        Some(minimum) => {
            let minimum = parse_tolerant(minimum)?;
            versions
                .iter()
                .filter(|(parsed, _)| *parsed >= minimum)
                .map(|(_, raw)| raw.to_string())
                .collect()
        }
    };

    Ok(selected)
}

/// Finds the record published under exactly `version`.
///
/// The lookup honors the variant-type restriction but no family filter.
pub fn resolve_exact<'a>(
    records: &'a [StemcellRecord],
    preference: SelectionPreference,
    version: &str,
) -> Result<&'a StemcellRecord> {
    filter_by_type(records, preference)
        .into_iter()
        .find(|record| record.version == version)
        .ok_or_else(|| StemcellError::VersionNotFound {
            version: version.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Variant;

    fn variant() -> Variant {
        Variant {
            url: "https://example.com/stemcell.tgz".to_string(),
            sha1: "abc".to_string(),
            ..Variant::default()
        }
    }

    fn light(versions: &[&str]) -> Vec<StemcellRecord> {
        versions
            .iter()
            .map(|v| StemcellRecord::new("s", *v, Some(variant()), None).unwrap())
            .collect()
    }

    fn regular(versions: &[&str]) -> Vec<StemcellRecord> {
        versions
            .iter()
            .map(|v| StemcellRecord::new("s", *v, None, Some(variant())).unwrap())
            .collect()
    }

    fn filter(minimum: Option<&str>, family: Option<&str>) -> VersionFilter {
        VersionFilter {
            minimum_version: minimum.map(str::to_string),
            family: family.map(str::to_string),
        }
    }

    fn list(records: &[StemcellRecord], minimum: Option<&str>, family: Option<&str>) -> Vec<String> {
        list_versions(records, SelectionPreference::default(), &filter(minimum, family)).unwrap()
    }

    #[test]
    fn test_parse_tolerant_pads_components() {
        assert_eq!(parse_tolerant("3262").unwrap(), Version::new(3262, 0, 0));
        assert_eq!(parse_tolerant("3262.4").unwrap(), Version::new(3262, 4, 0));
        assert_eq!(parse_tolerant(" 3262.4.1 ").unwrap(), Version::new(3262, 4, 1));
        assert_eq!(parse_tolerant("v1.08").unwrap(), Version::new(1, 8, 0));
        assert_eq!(parse_tolerant("1.0.0").unwrap(), Version::new(1, 0, 0));
    }

    #[test]
    fn test_parse_tolerant_rejects_garbage() {
        assert!(parse_tolerant("").is_err());
        assert!(parse_tolerant("abc").is_err());
        assert!(parse_tolerant("3262.4.1.2").is_err());
        assert!(parse_tolerant("1-rc").is_err());

        let err = parse_tolerant("3262.x").unwrap_err();
        assert!(err.to_string().starts_with("invalid version '3262.x'"));
    }

    #[test]
    fn test_parse_tolerant_keeps_full_prerelease() {
        let parsed = parse_tolerant("1.2.3-rc.1").unwrap();
        assert_eq!(parsed.pre.as_str(), "rc.1");
    }

    #[test]
    fn test_latest_only_without_minimum() {
        let records = light(&["3262", "3262.1", "3262.4"]);
        assert_eq!(list(&records, None, None), vec!["3262.4"]);
    }

    #[test]
    fn test_latest_uses_semver_not_lexical_order() {
        let records = light(&["3262.10", "3262.9", "3262.2"]);
        assert_eq!(list(&records, None, None), vec!["3262.10"]);
    }

    #[test]
    fn test_minimum_version_is_inclusive_and_sorted() {
        let records = light(&["3151.1", "3149", "3151"]);
        assert_eq!(list(&records, Some("3151"), None), vec!["3151", "3151.1"]);
    }

    #[test]
    fn test_empty_minimum_means_latest() {
        let records = light(&["1", "2"]);
        assert_eq!(list(&records, Some(""), None), vec!["2"]);
    }

    #[test]
    fn test_minimum_above_everything_is_empty() {
        let records = light(&["1", "2"]);
        assert!(list(&records, Some("3"), None).is_empty());
    }

    #[test]
    fn test_family_by_major() {
        let records = light(&["3262.4", "3262.4.1", "3262.5", "3263.14"]);
        assert_eq!(
            list(&records, Some("0"), Some("3262")),
            vec!["3262.4", "3262.4.1", "3262.5"]
        );
        assert_eq!(list(&records, None, Some("3262")), vec!["3262.5"]);
    }

    #[test]
    fn test_family_by_minor() {
        let records = light(&["3262.4", "3262.4.1", "3262.5", "3263.14"]);
        assert_eq!(
            list(&records, Some("0"), Some("3262.4")),
            vec!["3262.4", "3262.4.1"]
        );
    }

    #[test]
    fn test_family_by_patch() {
        let records = light(&["3262.4", "3262.4.1", "3262.4.2", "3262.5"]);
        assert_eq!(
            list(&records, Some("0"), Some("3262.4.1")),
            vec!["3262.4.1"]
        );
    }

    #[test]
    fn test_latest_family_applies_no_constraint() {
        let records = light(&["3262.4", "3262.4.1", "3262.5", "3263.14"]);
        assert_eq!(
            list(&records, Some("0"), Some(LATEST_FAMILY)),
            vec!["3262.4", "3262.4.1", "3262.5", "3263.14"]
        );
    }

    #[test]
    fn test_family_and_minimum_combine() {
        let records = light(&["3262.4", "3262.4.1", "3262.5", "3263.14"]);
        assert_eq!(
            list(&records, Some("3262.4.1"), Some("3262")),
            vec!["3262.4.1", "3262.5"]
        );
    }

    #[test]
    fn test_family_without_matches_is_empty() {
        let records = light(&["3262.4", "3263.14"]);
        assert!(list(&records, None, Some("3300")).is_empty());
    }

    #[test]
    fn test_type_exclusivity() {
        let mut records = light(&["1", "3"]);
        records.extend(regular(&["2", "4"]));
        let all = filter(Some("0"), None);

        assert_eq!(
            list_versions(&records, SelectionPreference::default(), &all).unwrap(),
            vec!["1", "3"]
        );
        assert_eq!(
            list_versions(&records, SelectionPreference::regular(), &all).unwrap(),
            vec!["2", "4"]
        );
    }

    #[test]
    fn test_regular_preference_without_regular_builds_is_empty() {
        let records = light(&["1", "2"]);
        let result = list_versions(&records, SelectionPreference::regular(), &filter(None, None));
        assert_eq!(result.unwrap(), Vec::<String>::new());
    }

    #[test]
    fn test_regular_only_catalog_is_listed_for_light_preference() {
        let records = regular(&["1", "2"]);
        assert_eq!(list(&records, None, None), vec!["2"]);
    }

    #[test]
    fn test_empty_catalog_is_empty() {
        assert!(list(&[], None, Some("3262")).is_empty());
    }

    #[test]
    fn test_malformed_catalog_version_is_fatal() {
        let records = light(&["3262.4", "not-a-version"]);
        let result = list_versions(&records, SelectionPreference::default(), &filter(None, None));
        assert!(matches!(
            result,
            Err(StemcellError::InvalidVersion { ref value, .. }) if value == "not-a-version"
        ));
    }

    #[test]
    fn test_malformed_family_is_fatal() {
        let records = light(&["3262.4"]);
        let result = list_versions(
            &records,
            SelectionPreference::default(),
            &filter(None, Some("jammy")),
        );
        assert!(matches!(result, Err(StemcellError::InvalidVersion { .. })));
    }

    #[test]
    fn test_malformed_minimum_is_fatal() {
        let records = light(&["3262.4"]);
        let result = list_versions(
            &records,
            SelectionPreference::default(),
            &filter(Some("3262.x"), None),
        );
        assert!(matches!(result, Err(StemcellError::InvalidVersion { .. })));
    }

    #[test]
    fn test_resolve_exact_finds_record() {
        let records = light(&["3262.4", "3262.5"]);
        let record = resolve_exact(&records, SelectionPreference::default(), "3262.5").unwrap();
        assert_eq!(record.version, "3262.5");
    }

    #[test]
    fn test_resolve_exact_matches_string_not_semver() {
        let records = light(&["3262.4"]);
        let result = resolve_exact(&records, SelectionPreference::default(), "3262.4.0");
        assert!(matches!(
            result,
            Err(StemcellError::VersionNotFound { ref version }) if version == "3262.4.0"
        ));
    }

    #[test]
    fn test_resolve_exact_honors_type_filter() {
        let mut records = light(&["1"]);
        records.extend(regular(&["2"]));

        assert!(resolve_exact(&records, SelectionPreference::default(), "2").is_err());
        assert!(resolve_exact(&records, SelectionPreference::regular(), "2").is_ok());
    }
}
