//! Content Masker (C5): redacts sensitive-info hits in place, leaving the
//! surrounding text intact (§4.5). Masking strategies are keyed by
//! [`SensitiveInfoKind`], mirroring the category keys the Rule Store loads
//! sensitive-info patterns under.

use crate::sensitive_info::{SensitiveHit, SensitiveInfoKind};

/// Masks every hit in `text`, applying hits in descending byte-offset order
/// so that earlier offsets stay valid as later ones are replaced (§4.5
/// "apply masks back-to-front so earlier byte offsets are not invalidated
/// by an earlier replacement").
pub fn mask_all(text: &str, hits: &[SensitiveHit]) -> String {
    let mut ordered: Vec<&SensitiveHit> = hits.iter().collect();
    ordered.sort_by(|a, b| b.start.cmp(&a.start));

    let mut out = text.to_string();
    for hit in ordered {
        let replacement = mask_value(hit.kind, &hit.matched_text);
        out.replace_range(hit.start..hit.end, &replacement);
    }
    out
}

/// Produces the masked replacement for one matched value. Each strategy
/// keeps enough of the original to be recognizable in logs without
/// reproducing the sensitive value itself.
fn mask_value(kind: SensitiveInfoKind, matched: &str) -> String {
    match kind {
        SensitiveInfoKind::CreditCard => mask_keep_edges(matched, 4, 4),
        SensitiveInfoKind::Email => mask_email(matched),
        SensitiveInfoKind::IdCard => mask_keep_edges(matched, 3, 4),
        SensitiveInfoKind::Phone => mask_keep_edges(matched, 3, 4),
        SensitiveInfoKind::Ssn | SensitiveInfoKind::ApiKey | SensitiveInfoKind::Other => {
            "****".to_string()
        }
    }
}

/// Keeps the first character of the local part and the whole domain:
/// `"jane.doe@example.com"` → `"j*******@example.com"`.
fn mask_email(matched: &str) -> String {
    match matched.split_once('@') {
        Some((local, domain)) => {
            let mut local_chars = local.chars();
            let first = local_chars.next().unwrap_or('*');
            let masked_local: String = std::iter::once(first)
                .chain(std::iter::repeat('*').take(local_chars.count()))
                .collect();
            format!("{masked_local}@{domain}")
        }
        None => "*".repeat(matched.chars().count()),
    }
}

/// Keeps `keep_start` leading and `keep_end` trailing characters, masks
/// everything between.
fn mask_keep_edges(matched: &str, keep_start: usize, keep_end: usize) -> String {
    let chars: Vec<char> = matched.chars().collect();
    if chars.len() <= keep_start + keep_end {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..keep_start].iter().collect();
    let tail: String = chars[chars.len() - keep_end..].iter().collect();
    let middle = "*".repeat(chars.len() - keep_start - keep_end);
    format!("{head}{middle}{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(kind: SensitiveInfoKind, start: usize, end: usize, matched_text: &str) -> SensitiveHit {
        SensitiveHit {
            kind,
            start,
            end,
            matched_text: matched_text.to_string(),
            pattern_source: String::new(),
        }
    }

    #[test]
    fn masks_credit_card_keeping_first_and_last_four() {
        let masked = mask_value(SensitiveInfoKind::CreditCard, "4111111111111111");
        assert_eq!(masked, "4111********1111");
    }

    #[test]
    fn masks_email_keeping_domain() {
        let masked = mask_value(SensitiveInfoKind::Email, "jane.doe@example.com");
        assert_eq!(masked, "j*******@example.com");
    }

    #[test]
    fn multiple_hits_apply_back_to_front_without_shifting_offsets() {
        let text = "card 4111111111111111 and email jane@example.com end";
        let hits = vec![
            hit(SensitiveInfoKind::CreditCard, 5, 21, "4111111111111111"),
            hit(SensitiveInfoKind::Email, 32, 48, "jane@example.com"),
        ];
        let masked = mask_all(text, &hits);
        assert!(masked.contains("4111********1111"));
        assert!(masked.contains("j***@example.com"));
        assert!(masked.ends_with("end"));
    }
}
