//! Filter Encoding 2.0 serialisation of layer predicates.
//!
//! WFS 2.0 carries server-side predicates in the `FILTER` query
//! parameter as an FES 2.0 XML document. Only the predicate kinds in
//! [`FilterPredicate`] are encoded; this is not a general FES writer.

use std::fmt::Write as _;

use crate::layer::FilterPredicate;

const FES_NS: &str = "http://www.opengis.net/fes/2.0";
const GML_NS: &str = "http://www.opengis.net/gml/3.2";

/// Encode a predicate list as one FES 2.0 `Filter` document.
///
/// Predicates are combined with logical AND; a single predicate is
/// emitted without the `And` wrapper and an empty list yields `None`
/// (an unfiltered, fetch-all query).
///
/// # Examples
///
/// ```
/// use vworld_core::{encode_filter, FilterPredicate};
///
/// let filter = encode_filter(&[FilterPredicate::like("sig_cd", "41*")])
///     .expect("non-empty predicate list");
/// assert!(filter.contains("<fes:PropertyIsLike"));
/// assert!(filter.contains("41*"));
/// assert!(encode_filter(&[]).is_none());
/// ```
#[must_use]
pub fn encode_filter(predicates: &[FilterPredicate]) -> Option<String> {
    if predicates.is_empty() {
        return None;
    }

    let mut body = String::new();
    for predicate in predicates {
        encode_predicate(&mut body, predicate);
    }

    let mut doc = format!("<fes:Filter xmlns:fes=\"{FES_NS}\" xmlns:gml=\"{GML_NS}\">");
    if predicates.len() > 1 {
        let _ = write!(doc, "<fes:And>{body}</fes:And>");
    } else {
        doc.push_str(&body);
    }
    doc.push_str("</fes:Filter>");
    Some(doc)
}

fn encode_predicate(out: &mut String, predicate: &FilterPredicate) {
    match predicate {
        FilterPredicate::Equals { attribute, literal } => {
            let _ = write!(
                out,
                "<fes:PropertyIsEqualTo>\
                 <fes:ValueReference>{}</fes:ValueReference>\
                 <fes:Literal>{}</fes:Literal>\
                 </fes:PropertyIsEqualTo>",
                escape_xml(attribute),
                escape_xml(literal),
            );
        }
        FilterPredicate::Like {
            attribute,
            pattern,
            wild_card,
            single_char,
            escape_char,
        } => {
            let _ = write!(
                out,
                "<fes:PropertyIsLike wildCard=\"{}\" singleChar=\"{}\" escapeChar=\"{}\">\
                 <fes:ValueReference>{}</fes:ValueReference>\
                 <fes:Literal>{}</fes:Literal>\
                 </fes:PropertyIsLike>",
                escape_xml(&wild_card.to_string()),
                escape_xml(&single_char.to_string()),
                escape_xml(&escape_char.to_string()),
                escape_xml(attribute),
                escape_xml(pattern),
            );
        }
        FilterPredicate::BboxIntersects {
            attribute,
            bbox,
            srid,
        } => {
            let _ = write!(
                out,
                "<fes:BBOX>\
                 <fes:ValueReference>{}</fes:ValueReference>\
                 <gml:Envelope srsName=\"{srid}\">\
                 <gml:lowerCorner>{} {}</gml:lowerCorner>\
                 <gml:upperCorner>{} {}</gml:upperCorner>\
                 </gml:Envelope>\
                 </fes:BBOX>",
                escape_xml(attribute),
                bbox.min_x,
                bbox.min_y,
                bbox.max_x,
                bbox.max_y,
            );
        }
    }
}

/// Minimal XML escaping for text content and attribute values.
fn escape_xml(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::BoundingBox;
    use crate::layer::Srid;
    use rstest::rstest;

    #[rstest]
    fn empty_predicate_list_is_unfiltered() {
        assert_eq!(encode_filter(&[]), None);
    }

    #[rstest]
    fn single_predicate_omits_and_wrapper() {
        let filter =
            encode_filter(&[FilterPredicate::equals("sig_cd", "41000")]).expect("should encode");

        assert!(!filter.contains("<fes:And>"));
        assert!(filter.contains("<fes:ValueReference>sig_cd</fes:ValueReference>"));
        assert!(filter.contains("<fes:Literal>41000</fes:Literal>"));
    }

    #[rstest]
    fn multiple_predicates_are_and_combined() {
        let filter = encode_filter(&[
            FilterPredicate::equals("sig_kor_nm", "수원시"),
            FilterPredicate::like("sig_cd", "41?1*"),
        ])
        .expect("should encode");

        assert!(filter.starts_with("<fes:Filter"));
        assert!(filter.contains("<fes:And>"));
        assert!(filter.contains("</fes:And></fes:Filter>"));
    }

    #[rstest]
    fn like_declares_caller_supplied_wildcards() {
        let filter = encode_filter(&[FilterPredicate::Like {
            attribute: "emd_cd".to_owned(),
            pattern: "41%".to_owned(),
            wild_card: '%',
            single_char: '_',
            escape_char: '!',
        }])
        .expect("should encode");

        assert!(filter.contains("wildCard=\"%\""));
        assert!(filter.contains("singleChar=\"_\""));
        assert!(filter.contains("escapeChar=\"!\""));
        assert!(filter.contains("<fes:Literal>41%</fes:Literal>"));
    }

    #[rstest]
    fn bbox_predicate_emits_gml_envelope() {
        let bbox = BoundingBox::new(144_693.0, 477_383.0, 275_745.0, 633_107.0)
            .expect("valid box");
        let filter = encode_filter(&[FilterPredicate::BboxIntersects {
            attribute: "ag_geom".to_owned(),
            bbox,
            srid: Srid::KOREA_2000_CENTRAL,
        }])
        .expect("should encode");

        assert!(filter.contains("srsName=\"EPSG:5186\""));
        assert!(filter.contains("<gml:lowerCorner>144693 477383</gml:lowerCorner>"));
        assert!(filter.contains("<gml:upperCorner>275745 633107</gml:upperCorner>"));
    }

    #[rstest]
    fn literal_values_are_escaped() {
        let filter = encode_filter(&[FilterPredicate::equals("name", "a<b&\"c\"")])
            .expect("should encode");

        assert!(filter.contains("a&lt;b&amp;&quot;c&quot;"));
    }
}
