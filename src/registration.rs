//! Registration string matching and ranking.
//!
//! A registration is a `/` separated path where every segment is a `.`
//! separated list of tokens:
//!
//! ```text
//! org/colorpipe/imaging/icc.lcms._CPU/rendering_intent.advanced
//! top/domain   /type   /application   /option
//! ```
//!
//! Patterns use the same syntax. Empty pattern segments are wildcards, so
//! `//imaging/icc.lcms` selects on the type and application fields only.
//! Pattern tokens may carry a match-type prefix:
//!
//! - `+` (default): the token is required.
//! - `_`: the token is optional and raises the rank when present.
//! - `-`: the token is excluded; a hit rejects the registration.
//!
//! A leading API digit (`4`..`9`) followed by a match-type char restricts
//! the token to one [`ApiKind`], e.g. `7+lcms`.

/// Module API kinds. The digit is used by API-scoped pattern tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiKind {
    /// No particular API; API-scoped pattern tokens never match.
    Any,
    /// Filter core / UI description.
    Ui,
    /// Loader of other modules.
    MetaLoader,
    /// Context conversion.
    Context,
    /// Node execution.
    Run,
    /// Device configuration.
    Device,
    /// Policy / common options.
    Policy,
}

impl ApiKind {
    /// The ASCII digit this kind uses in pattern tokens.
    pub const fn digit(self) -> Option<u8> {
        match self {
            ApiKind::Any => None,
            ApiKind::Ui => Some(b'4'),
            ApiKind::MetaLoader => Some(b'5'),
            ApiKind::Context => Some(b'6'),
            ApiKind::Run => Some(b'7'),
            ApiKind::Device => Some(b'8'),
            ApiKind::Policy => Some(b'9'),
        }
    }

    pub fn from_digit(digit: u8) -> Option<Self> {
        match digit {
            b'4' => Some(ApiKind::Ui),
            b'5' => Some(ApiKind::MetaLoader),
            b'6' => Some(ApiKind::Context),
            b'7' => Some(ApiKind::Run),
            b'8' => Some(ApiKind::Device),
            b'9' => Some(ApiKind::Policy),
            _ => None,
        }
    }
}

/// How a single pattern token participates in matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    Required,
    Optional,
    Excluded,
}

impl MatchType {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'+' => Some(MatchType::Required),
            b'_' => Some(MatchType::Optional),
            b'-' => Some(MatchType::Excluded),
            _ => None,
        }
    }
}

/// Positional fields of a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegField {
    Top,
    Domain,
    Type,
    Application,
    /// The option segment up to its first `.`.
    Option,
    /// The last segment, attributes included.
    Key,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PatternToken<'a> {
    api: Option<u8>,
    kind: MatchType,
    text: &'a str,
}

impl<'a> PatternToken<'a> {
    fn parse(token: &'a str) -> Self {
        let bytes = token.as_bytes();
        match bytes {
            [digit @ b'4'..=b'9', kind, ..] if MatchType::from_byte(*kind).is_some() => Self {
                api: Some(*digit),
                kind: MatchType::from_byte(*kind).unwrap_or(MatchType::Required),
                text: token.get(2..).unwrap_or(""),
            },
            [kind, ..] if *kind == b'_' || *kind == b'-' => Self {
                api: None,
                kind: MatchType::from_byte(*kind).unwrap_or(MatchType::Required),
                text: token.get(1..).unwrap_or(""),
            },
            _ => Self {
                api: None,
                kind: MatchType::Required,
                text: token,
            },
        }
    }
}

/// Strip the match-type / API prefix from a registration token.
fn token_text(token: &str) -> &str {
    PatternToken::parse(token).text
}

/// Match one pattern segment against one registration segment.
///
/// Returns `None` when the segment rejects the registration, otherwise the
/// number of matched tokens.
fn match_segment(reg_segment: &str, pat_segment: &str, api: ApiKind) -> Option<u32> {
    if pat_segment.is_empty() || reg_segment.is_empty() {
        return Some(0);
    }

    let mut rank = 0;
    for token in pat_segment.split('.').filter(|t| !t.is_empty()) {
        let wanted = PatternToken::parse(token);
        let api_ok = wanted.api.map_or(true, |digit| api.digit() == Some(digit));
        let found = api_ok
            && reg_segment
                .split('.')
                .any(|have| token_text(have) == wanted.text);

        match (wanted.kind, found) {
            (MatchType::Excluded, true) => return None,
            (MatchType::Required, false) => return None,
            (MatchType::Required | MatchType::Optional, true) => rank += 1,
            (MatchType::Optional | MatchType::Excluded, false) => {}
        }
    }
    Some(rank)
}

/// Rank how well `registration` satisfies `pattern`.
///
/// Returns 0 for no match. A pattern without any `/` is compared against
/// the key (last segment) of the registration only. Pattern segments past
/// the end of the registration must be empty.
pub fn rank(registration: &str, pattern: &str, api: ApiKind) -> u32 {
    let reg: Vec<&str> = registration.split('/').collect();
    let pat: Vec<&str> = pattern.split('/').collect();

    let total = if pat.len() == 1 {
        let key = reg.last().copied().unwrap_or("");
        match match_segment(key, pat[0], api) {
            Some(n) => n,
            None => return 0,
        }
    } else {
        if pat.len() > reg.len() && pat[reg.len()..].iter().any(|s| !s.is_empty()) {
            return 0;
        }
        let mut total = 0;
        for (r, p) in reg.iter().zip(pat.iter()) {
            match match_segment(r, p, api) {
                Some(n) => total += n,
                None => return 0,
            }
        }
        total
    };

    total.max(1)
}

/// Compare two option keys, ignoring key attributes.
///
/// The namespaces (everything before the last `/`) must match, and the key
/// names (last segment up to the first `.`) must be equal.
pub fn rank_key(a: &str, b: &str, api: ApiKind) -> u32 {
    let (Some((a_ns, a_key)), Some((b_ns, b_key))) = (a.rsplit_once('/'), b.rsplit_once('/'))
    else {
        return 0;
    };

    let namespace = rank(a_ns, b_ns, api);
    if namespace == 0 {
        return 0;
    }

    if key_name(a_key) == key_name(b_key) {
        namespace + 1
    } else {
        0
    }
}

fn key_name(segment: &str) -> &str {
    segment.split('.').next().unwrap_or("")
}

/// Extract one positional field. Empty fields yield `None`.
pub fn field(registration: &str, which: RegField) -> Option<&str> {
    let text = match which {
        RegField::Key => registration.rsplit('/').next(),
        RegField::Option => registration.split('/').nth(4).map(key_name),
        RegField::Top => registration.split('/').next(),
        RegField::Domain => registration.split('/').nth(1),
        RegField::Type => registration.split('/').nth(2),
        RegField::Application => registration.split('/').nth(3),
    };
    text.filter(|t| !t.is_empty())
}

/// Drop implementation attributes (`_` prefixed tokens) from every segment.
pub fn strip_implementation_attrs(registration: &str) -> String {
    registration
        .split('/')
        .map(|segment| {
            segment
                .split('.')
                .filter(|token| !token.starts_with('_'))
                .collect::<Vec<_>>()
                .join(".")
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const LCMS: &str = "org/colorpipe/imaging/icc.lcms._CPU._NOACCEL";

    #[test]
    fn test_exact_segments_rank_by_token_count() {
        assert_eq!(rank("org/colorpipe/imaging/icc.lcms", "//imaging/icc.lcms", ApiKind::Any), 3);
        assert_eq!(rank("org/colorpipe/imaging/icc", "//imaging/icc", ApiKind::Any), 2);
    }

    #[test]
    fn test_required_token_missing_rejects() {
        assert_eq!(rank("org/colorpipe/imaging/icc", "//imaging/icc.lcms", ApiKind::Any), 0);
        assert_eq!(rank(LCMS, "//imaging/icc.littlecms", ApiKind::Any), 0);
    }

    #[test]
    fn test_wildcard_pattern_gives_rank_one() {
        assert_eq!(rank(LCMS, "//", ApiKind::Any), 1);
        assert_eq!(rank(LCMS, "", ApiKind::Any), 1);
        assert_eq!(rank(LCMS, "///", ApiKind::Any), 1);
    }

    #[test]
    fn test_optional_and_excluded_tokens() {
        // Optional tokens count only when present
        assert_eq!(rank(LCMS, "//imaging/icc._CPU", ApiKind::Any), 3);
        assert_eq!(rank(LCMS, "//imaging/icc._GPU", ApiKind::Any), 2);
        // Excluded hit rejects, excluded miss is neutral
        assert_eq!(rank(LCMS, "//imaging/icc.-NOACCEL", ApiKind::Any), 0);
        assert_eq!(rank(LCMS, "//imaging/icc.-ACCEL", ApiKind::Any), 2);
    }

    #[test]
    fn test_registration_prefixes_are_ignored() {
        // `_CPU` in the registration still satisfies a required `CPU`
        assert_eq!(rank(LCMS, "//imaging/icc.CPU", ApiKind::Any), 3);
    }

    #[test]
    fn test_api_scoped_tokens() {
        let pattern = "//imaging/icc.7+lcms";
        assert_eq!(rank(LCMS, pattern, ApiKind::Run), 3);
        assert_eq!(rank(LCMS, pattern, ApiKind::Ui), 0);
        // Optional API-scoped token for another API is simply not counted
        assert_eq!(rank(LCMS, "//imaging/icc.4_lcms", ApiKind::Run), 2);
    }

    #[test]
    fn test_key_only_pattern() {
        let key = "org/colorpipe/imaging/root/pixel_layout.resolve";
        assert_eq!(rank(key, "pixel_layout", ApiKind::Any), 1);
        assert_eq!(rank(key, "resolve", ApiKind::Any), 1);
        assert_eq!(rank(key, "width", ApiKind::Any), 0);
    }

    #[test]
    fn test_pattern_longer_than_registration() {
        assert_eq!(rank("org/colorpipe/imaging", "//imaging/icc", ApiKind::Any), 0);
        assert_eq!(rank("org/colorpipe/imaging", "//imaging//", ApiKind::Any), 1);
    }

    #[test]
    fn test_resolve_scope_pattern() {
        let key = "org/colorpipe/imaging/output/pixel_layout.resolve";
        assert!(rank(key, "////resolve", ApiKind::Any) > 0);
        assert_eq!(
            rank("org/colorpipe/imaging/output/gain", "////resolve", ApiKind::Any),
            0
        );
    }

    #[test]
    fn test_rank_key() {
        let a = "org/colorpipe/imaging/icc/rendering_intent";
        let b = "org/colorpipe/imaging/icc/rendering_intent.advanced";
        let c = "org/colorpipe/imaging/icc/black_point";
        assert!(rank_key(a, b, ApiKind::Any) > 0);
        assert_eq!(rank_key(a, c, ApiKind::Any), 0);
        assert_eq!(rank_key("no_slash", a, ApiKind::Any), 0);
    }

    #[test]
    fn test_fields() {
        let reg = "org/colorpipe/imaging/icc.lcms/rendering_intent.advanced";
        assert_eq!(field(reg, RegField::Top), Some("org"));
        assert_eq!(field(reg, RegField::Domain), Some("colorpipe"));
        assert_eq!(field(reg, RegField::Type), Some("imaging"));
        assert_eq!(field(reg, RegField::Application), Some("icc.lcms"));
        assert_eq!(field(reg, RegField::Option), Some("rendering_intent"));
        assert_eq!(field(reg, RegField::Key), Some("rendering_intent.advanced"));
        assert_eq!(field("//imaging", RegField::Top), None);
    }

    #[test]
    fn test_strip_implementation_attrs() {
        assert_eq!(strip_implementation_attrs(LCMS), "org/colorpipe/imaging/icc.lcms");
        assert_eq!(
            strip_implementation_attrs("org/colorpipe/imaging/_x.icc"),
            "org/colorpipe/imaging/icc"
        );
    }

    #[test]
    fn test_api_digits_round_trip() {
        for api in [
            ApiKind::Ui,
            ApiKind::MetaLoader,
            ApiKind::Context,
            ApiKind::Run,
            ApiKind::Device,
            ApiKind::Policy,
        ] {
            let digit = api.digit().unwrap();
            assert_eq!(ApiKind::from_digit(digit), Some(api));
        }
        assert_eq!(ApiKind::Any.digit(), None);
    }

    proptest! {
        #[test]
        fn prop_registration_matches_itself(
            segments in proptest::collection::vec("[a-z]{1,6}(\\.[a-z]{1,6}){0,2}", 1..5)
        ) {
            let registration = segments.join("/");
            prop_assert!(rank(&registration, &registration, ApiKind::Any) > 0);
        }

        #[test]
        fn prop_wildcard_prefix_never_lowers_to_zero(
            app in "[a-z]{1,6}",
            attr in "[a-z]{1,6}",
        ) {
            let registration = format!("org/colorpipe/imaging/{}.{}", app, attr);
            let app_pattern = format!("//imaging/{}", app);
            prop_assert!(rank(&registration, &app_pattern, ApiKind::Any) > 0);
            prop_assert!(rank(&registration, "//", ApiKind::Any) > 0);
        }

        #[test]
        fn prop_excluded_attr_rejects(attr in "[a-z]{1,6}") {
            let registration = format!("org/colorpipe/imaging/icc.{}", attr);
            let pattern = format!("//imaging/icc.-{}", attr);
            prop_assert_eq!(rank(&registration, &pattern, ApiKind::Any), 0);
        }
    }
}
