//! Annotation classes attached to type expression nodes.
//!
//! Michelson distinguishes three annotation classes by sigil: `%field`
//! names a branch for object-style access, `:type` names the type
//! itself, `@variable` names a stack variable. Only the field class
//! affects this SDK's behavior; the others are carried for description
//! output.

/// The parsed annotations of one type expression node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotations {
    /// `%name` -- names this branch for named access.
    pub field: Option<String>,
    /// `:name`
    pub type_: Option<String>,
    /// `@name`
    pub variable: Option<String>,
}

impl Annotations {
    /// Parse a raw annot list. The last annotation of each class wins.
    /// A bare sigil (e.g. `"%"`) leaves that class unset.
    pub fn parse(raw: &[String]) -> Annotations {
        let mut out = Annotations::default();
        for annot in raw {
            let (sigil, name) = match annot.split_at_checked(1) {
                Some(parts) => parts,
                None => continue,
            };
            if name.is_empty() {
                continue;
            }
            match sigil {
                "%" => out.field = Some(name.to_string()),
                ":" => out.type_ = Some(name.to_string()),
                "@" => out.variable = Some(name.to_string()),
                _ => {}
            }
        }
        out
    }

    /// The field name, if this node carries one.
    pub fn field_name(&self) -> Option<&str> {
        self.field.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annots(raw: &[&str]) -> Annotations {
        let owned: Vec<String> = raw.iter().map(|s| s.to_string()).collect();
        Annotations::parse(&owned)
    }

    #[test]
    fn classifies_by_sigil() {
        let a = annots(&["%owner", ":t", "@x"]);
        assert_eq!(a.field.as_deref(), Some("owner"));
        assert_eq!(a.type_.as_deref(), Some("t"));
        assert_eq!(a.variable.as_deref(), Some("x"));
    }

    #[test]
    fn last_of_class_wins() {
        let a = annots(&["%first", "%second"]);
        assert_eq!(a.field.as_deref(), Some("second"));
    }

    #[test]
    fn bare_sigil_is_unannotated() {
        let a = annots(&["%"]);
        assert_eq!(a.field, None);
    }

    #[test]
    fn unknown_sigils_ignored() {
        let a = annots(&["&weird", ""]);
        assert_eq!(a, Annotations::default());
    }
}
