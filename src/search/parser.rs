//! Search string parser
//!
//! Turns `broker:"Marsh Ltd" class:8.9 Indonesia` into filters:
//!
//! ```text
//! broker:"Marsh Ltd"  ->  broker_name = Marsh Ltd
//! class:8.9           ->  class_of_business = 8.9
//! Indonesia           ->  _any = Indonesia
//! ```
//!
//! Tokens split on whitespace except inside `"..."` or `'...'`. A token whose
//! text before the first colon is a known shortcut becomes a field filter;
//! everything else is a broad `_any` term. Parsing never fails: an unmatched
//! quote is kept as a literal character.

use nom::{
    branch::alt,
    bytes::complete::{take_until, take_while1},
    character::complete::{char, multispace0, one_of},
    combinator::{all_consuming, map, recognize},
    multi::{many0, many1},
    sequence::{delimited, preceded, terminated},
    IResult,
};

use super::filter::{field_for_shortcut, SearchFilter};

/// Piece of a token: bare text or the inside of a quoted span
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Piece<'a> {
    Bare(&'a str),
    Quoted(&'a str),
}

impl<'a> Piece<'a> {
    fn text(&self) -> &'a str {
        match self {
            Piece::Bare(s) | Piece::Quoted(s) => s,
        }
    }
}

// =============================================================================
// ENTRY POINT
// =============================================================================

/// Parse a search box string into AND-ed filters
///
/// # Examples
///
/// ```
/// use mosaic_analytics::search::parse_search;
///
/// let filters = parse_search("broker:Howden Indonesia");
/// assert_eq!(filters[0].field, "broker_name");
/// assert_eq!(filters[1].field, "_any");
/// ```
pub fn parse_search(input: &str) -> Vec<SearchFilter> {
    match tokens(input) {
        Ok((_, tokens)) => tokens.iter().filter_map(|t| to_filter(t)).collect(),
        // Unreachable: every character is accepted by some piece parser
        Err(_) => Vec::new(),
    }
}

fn tokens(input: &str) -> IResult<&str, Vec<Vec<Piece<'_>>>> {
    all_consuming(terminated(
        many0(preceded(multispace0, token)),
        multispace0,
    ))(input)
}

// =============================================================================
// TOKENS
// =============================================================================

fn token(input: &str) -> IResult<&str, Vec<Piece<'_>>> {
    many1(alt((quoted_span, bare_run, lone_quote)))(input)
}

fn quoted_span(input: &str) -> IResult<&str, Piece<'_>> {
    map(
        alt((
            delimited(char('"'), take_until("\""), char('"')),
            delimited(char('\''), take_until("'"), char('\'')),
        )),
        Piece::Quoted,
    )(input)
}

fn bare_run(input: &str) -> IResult<&str, Piece<'_>> {
    map(
        take_while1(|c: char| !c.is_whitespace() && c != '"' && c != '\''),
        Piece::Bare,
    )(input)
}

/// A quote with no closing partner is plain text
fn lone_quote(input: &str) -> IResult<&str, Piece<'_>> {
    map(recognize(one_of("\"'")), Piece::Bare)(input)
}

// =============================================================================
// FILTERS
// =============================================================================

fn to_filter(pieces: &[Piece<'_>]) -> Option<SearchFilter> {
    if let Some((prefix, value)) = split_prefix(pieces) {
        if let Some(field) = field_for_shortcut(&prefix) {
            let value = value.trim();
            return (!value.is_empty()).then(|| SearchFilter::field(field, value));
        }
    }

    let text: String = pieces.iter().map(Piece::text).collect();
    let text = text.trim();
    (!text.is_empty()).then(|| SearchFilter::any(text))
}

/// Split at the first colon, provided no quoted span comes before it
fn split_prefix(pieces: &[Piece<'_>]) -> Option<(String, String)> {
    let mut prefix = String::new();
    for (i, piece) in pieces.iter().enumerate() {
        let Piece::Bare(text) = piece else {
            return None;
        };
        if let Some((left, right)) = text.split_once(':') {
            prefix.push_str(left);
            let mut value = right.to_string();
            value.extend(pieces[i + 1..].iter().map(Piece::text));
            return Some((prefix, value));
        }
        prefix.push_str(text);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(input: &str) -> Vec<(String, String)> {
        parse_search(input)
            .into_iter()
            .map(|f| (f.field, f.value))
            .collect()
    }

    fn pair(field: &str, value: &str) -> (String, String) {
        (field.to_string(), value.to_string())
    }

    #[test]
    fn test_shortcuts_and_broad_terms() {
        assert_eq!(
            parse_ok("broker:Howden class:8.9 Indonesia"),
            vec![
                pair("broker_name", "Howden"),
                pair("class_of_business", "8.9"),
                pair("_any", "Indonesia"),
            ]
        );
    }

    #[test]
    fn test_quoted_value_after_prefix() {
        assert_eq!(
            parse_ok(r#"broker:"Marsh Ltd" cedant:'Uzbek Re'"#),
            vec![pair("broker_name", "Marsh Ltd"), pair("cedant_name", "Uzbek Re")]
        );
    }

    #[test]
    fn test_quoted_broad_term_keeps_spaces() {
        assert_eq!(
            parse_ok(r#""Tashkent Metro" fire"#),
            vec![pair("_any", "Tashkent Metro"), pair("_any", "fire")]
        );
    }

    #[test]
    fn test_prefix_is_case_insensitive_and_aliases_share_columns() {
        assert_eq!(
            parse_ok("BROKER:x Ref:R1 slip:S2 Country:UZ"),
            vec![
                pair("broker_name", "x"),
                pair("reference_number", "R1"),
                pair("reference_number", "S2"),
                pair("territory", "UZ"),
            ]
        );
    }

    #[test]
    fn test_unknown_prefix_is_broad() {
        assert_eq!(parse_ok("color:red"), vec![pair("_any", "color:red")]);
        assert_eq!(
            parse_ok(r#""broker:Howden""#),
            vec![pair("_any", "broker:Howden")]
        );
    }

    #[test]
    fn test_only_first_colon_splits() {
        assert_eq!(parse_ok("ref:A:B"), vec![pair("reference_number", "A:B")]);
    }

    #[test]
    fn test_empty_values_are_dropped() {
        assert!(parse_ok("").is_empty());
        assert!(parse_ok("   ").is_empty());
        assert!(parse_ok("broker: \"\"").is_empty());
    }

    #[test]
    fn test_unmatched_quote_is_literal() {
        assert_eq!(
            parse_ok(r#"insured:"Acme"#),
            vec![pair("insured_name", "\"Acme")]
        );
        assert_eq!(parse_ok("O'Brien"), vec![pair("_any", "O'Brien")]);
    }
}
