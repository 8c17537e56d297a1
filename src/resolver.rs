//! Trait resolution.
//!
//! A trait is found by a single-hop scan of an attribute's direct children.
//! Absence is a normal outcome and is returned as `None`.

use std::iter::FusedIterator;

use crate::catalog::{TraitCategory, TraitKind};
use crate::entity::Attribute;

/// Finds the direct child of `attribute` carrying `kind`.
///
/// # Examples
///
/// ```rust,ignore
/// if let Some(hi) = find_trait(&temperature, TraitKind::UpperLimit) {
///     // compare against hi
/// }
/// ```
#[must_use]
pub fn find_trait(attribute: &Attribute, kind: TraitKind) -> Option<&Attribute> {
    attribute
        .children
        .iter()
        .find(|child| child.trait_kind == Some(kind))
}

/// Iterates over the direct children of `attribute` carrying any attribute trait.
///
/// The iterator is lazy and borrows the snapshot; call again to restart.
#[must_use]
pub fn all_traits(attribute: &Attribute) -> Traits<'_> {
    Traits {
        inner: attribute.children.iter(),
    }
}

/// Iterator returned by [`all_traits`].
#[derive(Debug, Clone)]
pub struct Traits<'a> {
    inner: std::slice::Iter<'a, Attribute>,
}

impl<'a> Iterator for Traits<'a> {
    type Item = &'a Attribute;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.by_ref().find(|child| {
            child
                .trait_kind
                .is_some_and(|k| k.category() == TraitCategory::AttributeTrait)
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.inner.size_hint().1)
    }
}

impl FusedIterator for Traits<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::entity::{AttributeId, AttributeOwner, EntityId};
    use crate::template::DataSource;
    use crate::value::ValueType;

    fn attr(name: &str, kind: Option<TraitKind>) -> Attribute {
        Attribute {
            id: AttributeId::new(),
            owner: AttributeOwner::Entity(EntityId::new()),
            subject_name: "Location1".to_string(),
            parent: None,
            template: None,
            name: name.to_string(),
            value_type: ValueType::Numeric,
            trait_kind: kind,
            source: DataSource::Stored,
            is_configuration_item: false,
            children: Vec::new(),
        }
    }

    fn temperature() -> Attribute {
        let mut t = attr("Temperature", None);
        t.children = vec![
            attr("LimitLo", Some(TraitKind::LowerLimit)),
            attr("Note", None),
            attr("LimitHi", Some(TraitKind::UpperLimit)),
            // Misplaced event trait; not part of the attribute-trait scan.
            attr("TriggerName", Some(TraitKind::CauseTriggerName)),
        ];
        t
    }

    #[test]
    fn find_trait_returns_matching_child() {
        let t = temperature();
        assert_eq!(find_trait(&t, TraitKind::UpperLimit).unwrap().name, "LimitHi");
        assert_eq!(find_trait(&t, TraitKind::LowerLimit).unwrap().name, "LimitLo");
    }

    #[test]
    fn find_trait_absent_is_none() {
        let t = temperature();
        assert!(find_trait(&t, TraitKind::Forecast).is_none());
        assert!(find_trait(&attr("Humidity", None), TraitKind::UpperLimit).is_none());
    }

    #[test]
    fn find_trait_does_not_descend() {
        let mut outer = attr("Temperature", None);
        let mut inner = attr("Nested", None);
        inner.children.push(attr("LimitHi", Some(TraitKind::UpperLimit)));
        outer.children.push(inner);
        assert!(find_trait(&outer, TraitKind::UpperLimit).is_none());
    }

    #[test]
    fn all_traits_skips_plain_and_event_children() {
        let t = temperature();
        let names: Vec<&str> = all_traits(&t).map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["LimitLo", "LimitHi"]);

        // Restartable: a fresh call yields the same sequence.
        assert_eq!(all_traits(&t).count(), 2);
        assert_eq!(all_traits(&attr("Humidity", None)).count(), 0);
    }
}
