//! Name encoding conventions.
//!
//! Every encoded name has the form
//! `{base}{postfix};{op};:T{tag}[,{source_tag}]`, where the postfix is a
//! chain of `;`-prefixed markers describing how the element relates to
//! its sources. When the base plus postfix grows past
//! [`MAX_PROVENANCE_LEN`] and a hasher is available, that part is
//! interned and replaced by `#{type_char}{hex_sid}`, keeping only the op
//! code and tag section readable.

use topo_types::MappedName;

use crate::hasher::{Hasher, Sid};

/// Separator that opens every postfix fragment.
pub const ELEMENT_MAP_PREFIX: &str = ";";

/// Element was reported as a modification of its source.
pub const POSTFIX_MOD: &str = ";:M";
/// Element was reported as generated from its source.
pub const POSTFIX_GEN: &str = ";:G";
/// Element was reported as both modified and generated.
pub const POSTFIX_MODGEN: &str = ";:MG";
/// Name derived upward from a named child element.
pub const POSTFIX_UPPER: &str = ";:U";
/// Name derived downward from a named ancestor element.
pub const POSTFIX_LOWER: &str = ";:L";
/// Marks an additional (secondary) source name in a source list.
pub const POSTFIX_EXTRA: &str = ";K";
/// Opens the owner-tag section.
pub const POSTFIX_TAG: &str = ";:T";

/// Provenance strings longer than this are interned when a hasher is
/// available.
pub const MAX_PROVENANCE_LEN: usize = 64;

/// Rewrite `name` in place into its encoded form.
///
/// `name` holds the base (source) name on entry. `postfix` is the
/// already-assembled provenance chain to append to it. `op` and `tag`
/// stay outside the interned region so the producing operation and the
/// owning document object remain visible on every name. A `source_tag`
/// different from `tag` records a cross-object source.
///
/// Sids referenced by the interned provenance are appended to `sids`.
#[allow(clippy::too_many_arguments)]
pub fn encode_element_name(
    element_type: char,
    name: &mut MappedName,
    postfix: &str,
    sids: &mut Vec<Sid>,
    hasher: Option<&Hasher>,
    tag: i64,
    op: &str,
    source_tag: i64,
) {
    let mut provenance = String::with_capacity(name.len() + postfix.len());
    provenance.push_str(name.as_str());
    provenance.push_str(postfix);

    if let Some(hasher) = hasher {
        if provenance.len() > MAX_PROVENANCE_LEN {
            let sid = hasher.intern(&provenance);
            provenance = format!("#{}{:x}", element_type, sid.id());
            sids.push(sid);
        }
    }

    let mut out = provenance;
    if !op.is_empty() {
        out.push(';');
        out.push_str(op);
    }
    if tag != 0 {
        out.push_str(POSTFIX_TAG);
        out.push_str(&tag.to_string());
        if source_tag != 0 && source_tag != tag {
            out.push(',');
            out.push_str(&source_tag.to_string());
        }
    }
    name.replace_with(out);
}

/// The postfix appended to imported child names: op code plus the
/// importing owner's tag.
pub fn child_postfix(op: &str, tag: i64) -> String {
    let mut out = String::new();
    if !op.is_empty() {
        out.push(';');
        out.push_str(op);
    }
    if tag != 0 {
        out.push_str(POSTFIX_TAG);
        out.push_str(&tag.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::StringHasher;

    #[test]
    fn short_names_stay_readable() {
        let mut name = MappedName::new("Edge3");
        let mut sids = Vec::new();
        encode_element_name(
            'F',
            &mut name,
            POSTFIX_GEN,
            &mut sids,
            None,
            4,
            "XTR",
            0,
        );
        assert_eq!(name.as_str(), "Edge3;:G;XTR;:T4");
        assert!(sids.is_empty());
    }

    #[test]
    fn source_tag_is_recorded_when_it_differs() {
        let mut name = MappedName::new("Face1");
        let mut sids = Vec::new();
        encode_element_name('F', &mut name, POSTFIX_MOD, &mut sids, None, 7, "FUS", 3);
        assert_eq!(name.as_str(), "Face1;:M;FUS;:T7,3");

        let mut name = MappedName::new("Face1");
        encode_element_name('F', &mut name, POSTFIX_MOD, &mut sids, None, 7, "FUS", 7);
        assert_eq!(name.as_str(), "Face1;:M;FUS;:T7");
    }

    #[test]
    fn long_provenance_is_interned() {
        let hasher = StringHasher::new();
        let base = "Edge3;:G;XTR;:T4".repeat(6);
        let mut name = MappedName::new(base.clone());
        let mut sids = Vec::new();
        encode_element_name(
            'E',
            &mut name,
            POSTFIX_UPPER,
            &mut sids,
            Some(&hasher),
            5,
            "FUS",
            0,
        );
        assert_eq!(sids.len(), 1);
        let expected = format!("#E{:x};FUS;:T5", sids[0].id());
        assert_eq!(name.as_str(), expected);
        assert_eq!(
            hasher.resolve(sids[0].id()).as_deref(),
            Some(format!("{}{}", base, POSTFIX_UPPER).as_str())
        );
        // Op and tag stay visible outside the interned region.
        assert!(name.contains(";FUS"));
        assert!(name.contains(";:T5"));
    }

    #[test]
    fn zero_tag_is_omitted() {
        let mut name = MappedName::new("Vertex1");
        let mut sids = Vec::new();
        encode_element_name('V', &mut name, "", &mut sids, None, 0, "CMP", 0);
        assert_eq!(name.as_str(), "Vertex1;CMP");
    }

    #[test]
    fn child_postfix_shape() {
        assert_eq!(child_postfix("CMP", 3), ";CMP;:T3");
        assert_eq!(child_postfix("", 3), ";:T3");
        assert_eq!(child_postfix("CMP", 0), ";CMP");
    }
}
