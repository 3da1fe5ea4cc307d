//! Citation label formatting.

use crate::models::PaperReference;

/// Build an "(Author et al., Year)" label from a reference.
///
/// Accepts author names in either "First Last" or "Last, First" form and
/// keys on the first author's family name. Returns an empty string when
/// there is nothing to cite.
pub fn citation_label(reference: &PaperReference) -> String {
    let last_name = reference
        .authors
        .first()
        .map(|name| family_name(name))
        .filter(|n| !n.is_empty());

    match (last_name, reference.year) {
        (Some(name), Some(year)) if reference.authors.len() > 1 => {
            format!("({name} et al., {year})")
        }
        (Some(name), Some(year)) => format!("({name}, {year})"),
        (Some(name), None) if reference.authors.len() > 1 => format!("({name} et al.)"),
        (Some(name), None) => format!("({name})"),
        (None, Some(year)) => format!("({year})"),
        (None, None) => String::new(),
    }
}

fn family_name(author: &str) -> &str {
    let author = author.trim();
    if let Some((last, _)) = author.split_once(',') {
        return last.trim();
    }
    author.split_whitespace().last().unwrap_or(author)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(authors: &[&str], year: Option<u16>) -> PaperReference {
        PaperReference {
            title: "T".to_string(),
            authors: authors.iter().map(|a| a.to_string()).collect(),
            year,
            ..Default::default()
        }
    }

    #[test]
    fn test_multiple_authors_use_et_al() {
        let r = reference(&["Ashish Vaswani", "Noam Shazeer"], Some(2017));
        assert_eq!(citation_label(&r), "(Vaswani et al., 2017)");
    }

    #[test]
    fn test_single_author() {
        let r = reference(&["Jacob Devlin"], Some(2019));
        assert_eq!(citation_label(&r), "(Devlin, 2019)");
    }

    #[test]
    fn test_last_name_first_format() {
        let r = reference(&["Devlin, Jacob"], Some(2019));
        assert_eq!(citation_label(&r), "(Devlin, 2019)");
    }

    #[test]
    fn test_year_only() {
        let r = reference(&[], Some(2020));
        assert_eq!(citation_label(&r), "(2020)");
    }

    #[test]
    fn test_no_authors_no_year_is_empty() {
        let r = reference(&[], None);
        assert_eq!(citation_label(&r), "");
    }

    #[test]
    fn test_authors_without_year() {
        let r = reference(&["A One", "B Two"], None);
        assert_eq!(citation_label(&r), "(One et al.)");
    }
}
