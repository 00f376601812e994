//! Ordered view over one collection of entries: a sort stack
//! (most-recently-set criterion is the primary key), an AND-combined filter
//! chain, and a marked set that ignores visibility entirely.

use std::{cmp::Ordering, collections::HashSet};

use crate::command::CommandError;
use crate::model::{Entry, EntryId, FieldValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn parse(token: &str) -> Result<Self, CommandError> {
        match token {
            "asc" | "ascending" => Ok(SortDirection::Ascending),
            "desc" | "descending" => Ok(SortDirection::Descending),
            other => Err(CommandError::Validation(format!(
                "sort direction must be asc or desc, not {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SortCriterion {
    pub field: &'static str,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Contains,
    Lt,
    Gt,
    Le,
    Ge,
}

/// One `field op value` predicate. Construction validates the field against
/// the view's declared field set.
#[derive(Debug, Clone)]
pub struct FilterPredicate {
    pub field: &'static str,
    pub op: FilterOp,
    pub value: String,
}

impl FilterPredicate {
    pub fn new(
        field: &str,
        op: FilterOp,
        value: impl Into<String>,
        fields: &'static [&'static str],
    ) -> Result<Self, CommandError> {
        Ok(Self {
            field: resolve_field(field, fields)?,
            op,
            value: value.into(),
        })
    }

    /// Parses expressions like `name~debian`, `progress>=50` or
    /// `status=seeding`. Longer operators are tried first so `<=` never
    /// parses as `<`.
    pub fn parse(expr: &str, fields: &'static [&'static str]) -> Result<Self, CommandError> {
        const OPS: [(&str, FilterOp); 7] = [
            ("<=", FilterOp::Le),
            (">=", FilterOp::Ge),
            ("!=", FilterOp::Ne),
            ("=", FilterOp::Eq),
            ("~", FilterOp::Contains),
            ("<", FilterOp::Lt),
            (">", FilterOp::Gt),
        ];
        for (token, op) in OPS {
            if let Some(pos) = expr.find(token) {
                let field = expr[..pos].trim();
                let value = expr[pos + token.len()..].trim();
                if field.is_empty() || value.is_empty() {
                    return Err(CommandError::Parse(format!(
                        "filter expression {expr:?} is missing a field or value"
                    )));
                }
                return Self::new(field, op, value, fields);
            }
        }
        Err(CommandError::Parse(format!(
            "filter expression {expr:?} has no operator (=, !=, ~, <, >, <=, >=)"
        )))
    }

    pub fn matches<E: Entry>(&self, entry: &E) -> bool {
        let Some(actual) = entry.field(self.field) else {
            return false;
        };
        match (&actual, self.op) {
            (FieldValue::Text(text), FilterOp::Contains) => {
                text.to_lowercase().contains(&self.value.to_lowercase())
            }
            (FieldValue::Text(text), FilterOp::Eq) => text.eq_ignore_ascii_case(&self.value),
            (FieldValue::Text(text), FilterOp::Ne) => !text.eq_ignore_ascii_case(&self.value),
            (FieldValue::Bool(flag), FilterOp::Eq) => {
                self.value.eq_ignore_ascii_case(if *flag { "true" } else { "false" })
            }
            (FieldValue::Bool(flag), FilterOp::Ne) => {
                !self.value.eq_ignore_ascii_case(if *flag { "true" } else { "false" })
            }
            (FieldValue::Number(_), _) | (FieldValue::Text(_), _) => {
                let Ok(wanted) = self.value.parse::<f64>() else {
                    return false;
                };
                let ord = actual.compare(&FieldValue::Number(wanted));
                match self.op {
                    FilterOp::Eq => ord == Ordering::Equal,
                    FilterOp::Ne => ord != Ordering::Equal,
                    FilterOp::Lt => ord == Ordering::Less,
                    FilterOp::Gt => ord == Ordering::Greater,
                    FilterOp::Le => ord != Ordering::Greater,
                    FilterOp::Ge => ord != Ordering::Less,
                    FilterOp::Contains => false,
                }
            }
            (FieldValue::Bool(_), _) => false,
        }
    }

    pub fn describe(&self) -> String {
        let op = match self.op {
            FilterOp::Eq => "=",
            FilterOp::Ne => "!=",
            FilterOp::Contains => "~",
            FilterOp::Lt => "<",
            FilterOp::Gt => ">",
            FilterOp::Le => "<=",
            FilterOp::Ge => ">=",
        };
        format!("{}{}{}", self.field, op, self.value)
    }
}

fn resolve_field(
    name: &str,
    fields: &'static [&'static str],
) -> Result<&'static str, CommandError> {
    fields
        .iter()
        .find(|f| **f == name)
        .copied()
        .ok_or_else(|| {
            CommandError::Validation(format!(
                "unknown field {name:?}; expected one of {}",
                fields.join(", ")
            ))
        })
}

#[derive(Debug)]
pub struct ListModel<E: Entry> {
    items: Vec<E>,
    sort_stack: Vec<SortCriterion>,
    filters: Vec<FilterPredicate>,
    marked: HashSet<EntryId>,
    focused: Option<EntryId>,
}

impl<E: Entry> Default for ListModel<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entry> ListModel<E> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            sort_stack: Vec::new(),
            filters: Vec::new(),
            marked: HashSet::new(),
            focused: None,
        }
    }

    /// Swaps in a fresh backend snapshot. Marks survive for ids that still
    /// exist; marks of destroyed items are dropped; focus sticks to its id
    /// when possible, otherwise falls back to the first visible item.
    pub fn replace_items(&mut self, items: Vec<E>) {
        self.items = items;
        let live: HashSet<EntryId> = self.items.iter().map(Entry::id).collect();
        self.marked.retain(|id| live.contains(id));
        if let Some(focused) = self.focused {
            if !live.contains(&focused) {
                self.focused = None;
            }
        }
        if self.focused.is_none() {
            self.focused = self.visible_items().first().map(|e| e.id());
        }
    }

    pub fn items(&self) -> &[E] {
        &self.items
    }

    /// Makes `(field, direction)` the primary sort key. If the field is
    /// already in the stack it is moved to the front, so earlier-set keys
    /// demote to tie-breakers in the order they were set.
    pub fn set_sort(&mut self, field: &str, direction: SortDirection) -> Result<(), CommandError> {
        let field = resolve_field(field, E::FIELDS)?;
        self.sort_stack.retain(|c| c.field != field);
        self.sort_stack.insert(0, SortCriterion { field, direction });
        Ok(())
    }

    pub fn clear_sort(&mut self) {
        self.sort_stack.clear();
    }

    pub fn sort_stack(&self) -> &[SortCriterion] {
        &self.sort_stack
    }

    pub fn add_filter(&mut self, predicate: FilterPredicate) {
        self.filters.push(predicate);
    }

    pub fn remove_filter(&mut self, index: usize) -> Result<(), CommandError> {
        if index >= self.filters.len() {
            return Err(CommandError::Validation(format!(
                "no filter at index {index}; {} active",
                self.filters.len()
            )));
        }
        self.filters.remove(index);
        Ok(())
    }

    pub fn clear_filters(&mut self) {
        self.filters.clear();
    }

    pub fn filters(&self) -> &[FilterPredicate] {
        &self.filters
    }

    /// The filtered, sorted sequence. Recomputed on every call; an empty
    /// result is a valid visible set, not an error.
    pub fn visible_items(&self) -> Vec<&E> {
        let mut visible: Vec<&E> = self
            .items
            .iter()
            .filter(|e| self.filters.iter().all(|p| p.matches(*e)))
            .collect();
        visible.sort_by(|a, b| {
            for criterion in &self.sort_stack {
                // Entries claiming the capability answer for every declared
                // field, so both lookups succeed for validated criteria.
                let (Some(va), Some(vb)) =
                    (a.field(criterion.field), b.field(criterion.field))
                else {
                    continue;
                };
                let ord = match criterion.direction {
                    SortDirection::Ascending => va.compare(&vb),
                    SortDirection::Descending => vb.compare(&va),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            a.id().cmp(&b.id())
        });
        visible
    }

    pub fn mark(&mut self, ids: &[EntryId]) {
        let live: HashSet<EntryId> = self.items.iter().map(Entry::id).collect();
        self.marked.extend(ids.iter().filter(|id| live.contains(id)));
    }

    /// Marks every item matching the predicate, visible or not.
    pub fn mark_where(&mut self, predicate: &FilterPredicate) {
        let ids: Vec<EntryId> = self
            .items
            .iter()
            .filter(|e| predicate.matches(*e))
            .map(Entry::id)
            .collect();
        self.marked.extend(ids);
    }

    pub fn mark_all(&mut self) {
        self.marked = self.items.iter().map(Entry::id).collect();
    }

    pub fn unmark(&mut self, ids: &[EntryId]) {
        for id in ids {
            self.marked.remove(id);
        }
    }

    pub fn unmark_where(&mut self, predicate: &FilterPredicate) {
        let ids: Vec<EntryId> = self
            .items
            .iter()
            .filter(|e| predicate.matches(*e))
            .map(Entry::id)
            .collect();
        for id in ids {
            self.marked.remove(&id);
        }
    }

    pub fn toggle_mark(&mut self, id: EntryId) {
        if !self.marked.remove(&id) && self.items.iter().any(|e| e.id() == id) {
            self.marked.insert(id);
        }
    }

    pub fn clear_marks(&mut self) {
        self.marked.clear();
    }

    pub fn is_marked(&self, id: EntryId) -> bool {
        self.marked.contains(&id)
    }

    /// Marked items including those currently hidden by the filter chain.
    pub fn marked_count(&self) -> usize {
        self.marked.len()
    }

    pub fn marked_ids(&self) -> Vec<EntryId> {
        let mut ids: Vec<EntryId> = self.marked.iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn focused_id(&self) -> Option<EntryId> {
        self.focused
    }

    pub fn focused_item(&self) -> Option<&E> {
        let id = self.focused?;
        self.items.iter().find(|e| e.id() == id)
    }

    /// Index of the focused item within the visible sequence.
    pub fn focus_position(&self) -> Option<usize> {
        let id = self.focused?;
        self.visible_items().iter().position(|e| e.id() == id)
    }

    pub fn focus_delta(&mut self, delta: isize) {
        let visible = self.visible_items();
        if visible.is_empty() {
            self.focused = None;
            return;
        }
        let current = self
            .focused
            .and_then(|id| visible.iter().position(|e| e.id() == id))
            .unwrap_or(0) as isize;
        let next = (current + delta).clamp(0, visible.len() as isize - 1) as usize;
        self.focused = Some(visible[next].id());
    }

    /// Moves focus to the given id if it is currently visible. Returns
    /// whether the focus moved.
    pub fn focus_id(&mut self, id: EntryId) -> bool {
        if self.visible_items().iter().any(|e| e.id() == id) {
            self.focused = Some(id);
            true
        } else {
            false
        }
    }

    pub fn focus_first(&mut self) {
        self.focused = self.visible_items().first().map(|e| e.id());
    }

    pub fn focus_last(&mut self) {
        self.focused = self.visible_items().last().map(|e| e.id());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{sample_torrent, TorrentItem};

    fn model() -> ListModel<TorrentItem> {
        let mut model = ListModel::new();
        model.replace_items(vec![
            sample_torrent(1, "beta", 200),
            sample_torrent(2, "alpha", 100),
            sample_torrent(3, "alpha", 300),
        ]);
        model
    }

    fn visible_ids(model: &ListModel<TorrentItem>) -> Vec<i64> {
        model.visible_items().iter().map(|t| t.torrent_id).collect()
    }

    #[test]
    fn most_recent_sort_key_is_primary() {
        let mut model = model();
        model.set_sort("name", SortDirection::Ascending).unwrap();
        model.set_sort("size", SortDirection::Descending).unwrap();
        // Primary: size desc. Ties broken by name asc, then id.
        assert_eq!(visible_ids(&model), vec![3, 1, 2]);
    }

    #[test]
    fn re_sorting_a_field_promotes_it_without_duplication() {
        let mut model = model();
        model.set_sort("size", SortDirection::Ascending).unwrap();
        model.set_sort("name", SortDirection::Ascending).unwrap();
        model.set_sort("size", SortDirection::Descending).unwrap();
        assert_eq!(model.sort_stack().len(), 2);
        assert_eq!(model.sort_stack()[0].field, "size");
        assert_eq!(visible_ids(&model), vec![3, 1, 2]);
    }

    #[test]
    fn unknown_sort_field_is_a_validation_error() {
        let mut model = model();
        assert!(matches!(
            model.set_sort("bogus", SortDirection::Ascending),
            Err(CommandError::Validation(_))
        ));
    }

    #[test]
    fn filters_combine_with_logical_and() {
        let mut model = model();
        model.add_filter(FilterPredicate::parse("name~alpha", TorrentItem::FIELDS).unwrap());
        assert_eq!(visible_ids(&model).len(), 2);
        model.add_filter(FilterPredicate::parse("size>150", TorrentItem::FIELDS).unwrap());
        assert_eq!(visible_ids(&model), vec![3]);
        model.remove_filter(1).unwrap();
        assert_eq!(visible_ids(&model).len(), 2);
        model.clear_filters();
        assert_eq!(visible_ids(&model).len(), 3);
    }

    #[test]
    fn filter_parse_errors() {
        assert!(matches!(
            FilterPredicate::parse("name debian", TorrentItem::FIELDS),
            Err(CommandError::Parse(_))
        ));
        assert!(matches!(
            FilterPredicate::parse("bogus=1", TorrentItem::FIELDS),
            Err(CommandError::Validation(_))
        ));
        assert!(matches!(
            FilterPredicate::parse("name~", TorrentItem::FIELDS),
            Err(CommandError::Parse(_))
        ));
    }

    #[test]
    fn marks_survive_filtering() {
        let mut model = model();
        model.mark(&[1]);
        model.add_filter(FilterPredicate::parse("name~alpha", TorrentItem::FIELDS).unwrap());
        assert!(!visible_ids(&model).contains(&1));
        assert_eq!(model.marked_count(), 1);
        model.clear_filters();
        assert!(model.is_marked(1));
    }

    #[test]
    fn marks_drop_only_with_their_items() {
        let mut model = model();
        model.mark(&[1, 3]);
        model.replace_items(vec![sample_torrent(1, "beta", 200)]);
        assert_eq!(model.marked_ids(), vec![1]);
    }

    #[test]
    fn mark_by_predicate_ignores_visibility() {
        let mut model = model();
        model.add_filter(FilterPredicate::parse("size>250", TorrentItem::FIELDS).unwrap());
        let all_alpha = FilterPredicate::parse("name~alpha", TorrentItem::FIELDS).unwrap();
        model.mark_where(&all_alpha);
        // Torrent 2 is hidden by the size filter but still marked.
        assert_eq!(model.marked_ids(), vec![2, 3]);
        model.unmark_where(&all_alpha);
        assert_eq!(model.marked_count(), 0);
    }

    #[test]
    fn toggle_mark_only_targets_existing_items() {
        let mut model = model();
        model.toggle_mark(2);
        assert!(model.is_marked(2));
        model.toggle_mark(2);
        assert!(!model.is_marked(2));
        model.toggle_mark(99);
        assert_eq!(model.marked_count(), 0);
    }

    #[test]
    fn empty_visible_set_is_valid() {
        let mut model = model();
        model.add_filter(FilterPredicate::parse("name~zzz", TorrentItem::FIELDS).unwrap());
        assert!(model.visible_items().is_empty());
        assert_eq!(model.focus_position(), None);
        model.focus_delta(1);
        assert_eq!(model.focused_id(), None);
    }

    #[test]
    fn focus_follows_id_across_snapshots() {
        let mut model = model();
        model.focus_last();
        let focused = model.focused_id();
        model.replace_items(vec![
            sample_torrent(3, "alpha", 300),
            sample_torrent(1, "beta", 200),
        ]);
        assert_eq!(model.focused_id(), focused);
    }

    #[test]
    fn focus_moves_within_visible_bounds() {
        let mut model = model();
        model.focus_first();
        model.focus_delta(10);
        assert_eq!(model.focus_position(), Some(2));
        model.focus_delta(-1);
        assert_eq!(model.focus_position(), Some(1));
    }
}
