//! Type-driven filter controls.
//!
//! [`render_filters`] turns the schema's filterable fields plus the current
//! filter values into one control descriptor per field. [`apply_input`] turns
//! a raw edit on a control into the next `FilterValue` for that field,
//! merging range sub-parts with the stored value.

use chrono::NaiveDate;

use crate::error::{ReportError, ReportResult};
use crate::models::{DateRange, FieldType, FilterSet, FilterValue, NumberRange, ReportField};
use crate::services::relation_options::OptionsStatus;

/// Option value a single-select sends for "no filter".
pub const ALL_OPTION: &str = "all";

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq)]
pub enum FilterControl {
    /// Tri-state switch: `None` means "all".
    Toggle { value: Option<bool> },
    /// Single-select over `options` plus an implicit "all". `chips` holds a
    /// multi-select value when one is stored.
    Select {
        options: Vec<String>,
        selected: Option<String>,
        chips: Vec<String>,
    },
    /// Single-select over lazily loaded options.
    Relation {
        status: OptionsStatus,
        selected: Option<i64>,
    },
    NumberRange { min: Option<i64>, max: Option<i64> },
    DateRange {
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    },
    Text { value: String, placeholder: String },
}

impl FilterControl {
    /// Text next to a toggle: "Yes", "No" or "All".
    pub fn toggle_label(&self) -> Option<&'static str> {
        match self {
            FilterControl::Toggle { value: Some(true) } => Some("Yes"),
            FilterControl::Toggle { value: Some(false) } => Some("No"),
            FilterControl::Toggle { value: None } => Some("All"),
            _ => None,
        }
    }

    /// Whether the control shows a "clear" affordance.
    pub fn is_clearable(&self) -> bool {
        match self {
            FilterControl::Toggle { value } => value.is_some(),
            FilterControl::Select { selected, chips, .. } => selected.is_some() || !chips.is_empty(),
            FilterControl::Relation { selected, .. } => selected.is_some(),
            FilterControl::NumberRange { min, max } => min.is_some() || max.is_some(),
            FilterControl::DateRange { from, to } => from.is_some() || to.is_some(),
            FilterControl::Text { value, .. } => !value.is_empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedFilter<'a> {
    pub field: &'a ReportField,
    pub control: FilterControl,
}

/// One control per filterable field, in schema order. Computed fields have
/// no control and are skipped.
pub fn render_filters<'a, F>(
    fields: &'a [ReportField],
    filters: &FilterSet,
    relation_status: F,
) -> Vec<RenderedFilter<'a>>
where
    F: Fn(&str) -> OptionsStatus,
{
    fields
        .iter()
        .filter_map(|field| {
            let value = filters.get(&field.key);
            let control = match field.field_type {
                FieldType::Boolean => FilterControl::Toggle {
                    value: match value {
                        Some(FilterValue::Bool(b)) => Some(*b),
                        _ => None,
                    },
                },
                FieldType::Choice => {
                    let (selected, chips) = match value {
                        Some(FilterValue::Text(s)) => (Some(s.clone()), Vec::new()),
                        Some(FilterValue::Choices(v)) => (None, v.clone()),
                        _ => (None, Vec::new()),
                    };
                    FilterControl::Select {
                        options: field.choices().to_vec(),
                        selected,
                        chips,
                    }
                }
                FieldType::Relation => FilterControl::Relation {
                    status: relation_status(&field.key),
                    selected: match value {
                        Some(FilterValue::Id(id)) => Some(*id),
                        _ => None,
                    },
                },
                FieldType::Number => {
                    let range = match value {
                        Some(FilterValue::Number(r)) => *r,
                        _ => NumberRange::default(),
                    };
                    FilterControl::NumberRange {
                        min: range.min,
                        max: range.max,
                    }
                }
                FieldType::Date => {
                    let range = match value {
                        Some(FilterValue::Date(r)) => *r,
                        _ => DateRange::default(),
                    };
                    FilterControl::DateRange {
                        from: range.from,
                        to: range.to,
                    }
                }
                FieldType::String => FilterControl::Text {
                    value: match value {
                        Some(FilterValue::Text(s)) => s.clone(),
                        _ => String::new(),
                    },
                    placeholder: format!("Search {}...", field.label.to_lowercase()),
                },
                FieldType::Computed => {
                    tracing::warn!("Skipping computed field '{}' in filters", field.key);
                    return None;
                }
            };
            Some(RenderedFilter { field, control })
        })
        .collect()
}

/// A raw edit coming from a filter control.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlInput {
    Toggle(Option<bool>),
    /// Single-select pick; `None` or [`ALL_OPTION`] clears.
    Select(Option<String>),
    AddChip(String),
    RemoveChip(String),
    Relation(Option<i64>),
    Min(String),
    Max(String),
    From(String),
    To(String),
    Text(String),
}

impl ControlInput {
    fn accepted_by(&self, field_type: FieldType) -> bool {
        matches!(
            (field_type, self),
            (FieldType::Boolean, ControlInput::Toggle(_))
                | (
                    FieldType::Choice,
                    ControlInput::Select(_) | ControlInput::AddChip(_) | ControlInput::RemoveChip(_)
                )
                | (FieldType::Relation, ControlInput::Relation(_))
                | (FieldType::Number, ControlInput::Min(_) | ControlInput::Max(_))
                | (FieldType::Date, ControlInput::From(_) | ControlInput::To(_))
                | (FieldType::String, ControlInput::Text(_))
        )
    }
}

/// The value to store for `field` after applying `input` to `current`.
///
/// A chip edit on a single-selected choice promotes the scalar into the list;
/// a single-select pick replaces any chip list.
pub fn apply_input(
    field: &ReportField,
    current: Option<&FilterValue>,
    input: ControlInput,
) -> ReportResult<FilterValue> {
    if !input.accepted_by(field.field_type) {
        return Err(ReportError::Validation(format!(
            "{:?} is not an edit for {} field '{}'",
            input, field.field_type, field.key
        )));
    }

    let value = match input {
        ControlInput::Toggle(v) => v.into(),
        ControlInput::Select(choice) => match choice {
            Some(c) if !c.is_empty() && c != ALL_OPTION => FilterValue::Text(c),
            _ => FilterValue::Null,
        },
        ControlInput::AddChip(chip) => {
            let mut chips = current_chips(current);
            if !chips.contains(&chip) {
                chips.push(chip);
            }
            FilterValue::Choices(chips)
        }
        ControlInput::RemoveChip(chip) => {
            let mut chips = current_chips(current);
            chips.retain(|c| *c != chip);
            FilterValue::Choices(chips)
        }
        ControlInput::Relation(id) => id.map(FilterValue::Id).unwrap_or(FilterValue::Null),
        ControlInput::Min(raw) => FilterValue::Number(NumberRange {
            min: parse_number(&raw)?,
            ..current_number(current)
        }),
        ControlInput::Max(raw) => FilterValue::Number(NumberRange {
            max: parse_number(&raw)?,
            ..current_number(current)
        }),
        ControlInput::From(raw) => FilterValue::Date(DateRange {
            from: parse_date(&raw)?,
            ..current_date(current)
        }),
        ControlInput::To(raw) => FilterValue::Date(DateRange {
            to: parse_date(&raw)?,
            ..current_date(current)
        }),
        ControlInput::Text(text) => {
            if text.is_empty() {
                FilterValue::Null
            } else {
                FilterValue::Text(text)
            }
        }
    };

    Ok(value)
}

fn current_chips(current: Option<&FilterValue>) -> Vec<String> {
    match current {
        Some(FilterValue::Choices(v)) => v.clone(),
        Some(FilterValue::Text(s)) if !s.is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

fn current_number(current: Option<&FilterValue>) -> NumberRange {
    match current {
        Some(FilterValue::Number(r)) => *r,
        _ => NumberRange::default(),
    }
}

fn current_date(current: Option<&FilterValue>) -> DateRange {
    match current {
        Some(FilterValue::Date(r)) => *r,
        _ => DateRange::default(),
    }
}

/// Blank parses to `None`, never to zero.
pub fn parse_number(raw: &str) -> ReportResult<Option<i64>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse()
        .map(Some)
        .map_err(|_| ReportError::Validation(format!("'{}' is not a whole number", raw)))
}

/// `YYYY-MM-DD`; blank parses to `None`.
pub fn parse_date(raw: &str) -> ReportResult<Option<NaiveDate>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map(Some)
        .map_err(|_| ReportError::Validation(format!("'{}' is not a YYYY-MM-DD date", raw)))
}
