use std::collections::HashMap;

use crate::error::{ReconError, Result};
use crate::recon::models::{InputRow, PlannedRow, TableTarget};

/// Standard-Zuordnung Export-Objekttyp → Tabellenfragment
pub fn default_categories() -> HashMap<String, String> {
    [
        ("Bounce", "BounceEvent"),
        ("Click", "ClickEvent"),
        ("Email", "Email"),
        ("ForwardedEmail", "ForwardedEmailEvent"),
        ("NotSent", "NotSentEvent"),
        ("Open", "OpenEvent"),
        ("Send", "Send"),
        ("Sent", "SentEvent"),
        ("Unsubscribe", "UnsubEvent"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

pub fn default_business_unit_aliases() -> HashMap<String, String> {
    HashMap::from([
        ("lennar corporation".to_string(), "lennar".to_string()),
        ("california coastal".to_string(), "cal coastal".to_string()),
    ])
}

/// Kleinschreibung, Whitespace und Bindestriche entfernen
pub fn sanitize(label: &str) -> String {
    label
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    BusinessUnit,
    Object,
}

/// Namensvorlage mit den Platzhaltern `{business_unit}` und `{object}`
///
/// `{{` und `}}` stehen für geschweifte Klammern im Namen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamePattern {
    segments: Vec<Segment>,
}

impl NamePattern {
    pub fn parse(raw: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = raw.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(ch) => name.push(ch),
                            None => {
                                return Err(ReconError::Config(format!(
                                    "name pattern '{}' has an unclosed placeholder",
                                    raw
                                )))
                            }
                        }
                    }
                    let placeholder = match name.as_str() {
                        "business_unit" => Segment::BusinessUnit,
                        "object" => Segment::Object,
                        other => {
                            return Err(ReconError::Config(format!(
                                "name pattern '{}' uses unknown placeholder '{{{}}}'",
                                raw, other
                            )))
                        }
                    };
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(placeholder);
                }
                '}' => {
                    return Err(ReconError::Config(format!(
                        "name pattern '{}' has an unmatched '}}'",
                        raw
                    )))
                }
                other => literal.push(other),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        if segments.is_empty() {
            return Err(ReconError::Config("name pattern must not be empty".to_string()));
        }

        Ok(Self { segments })
    }

    pub fn render(&self, business_unit: &str, object: &str) -> String {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(text) => text.as_str(),
                Segment::BusinessUnit => business_unit,
                Segment::Object => object,
            })
            .collect()
    }
}

/// Leitet Athena Datenbank und Tabelle aus einer InputRow ab
#[derive(Debug, Clone)]
pub struct TableNaming {
    database: NamePattern,
    table: NamePattern,
    categories: HashMap<String, String>,
}

impl TableNaming {
    /// Die Lookup-Tabelle wird ohne Beachtung der Groß-/Kleinschreibung abgefragt
    pub fn new(
        database: NamePattern,
        table: NamePattern,
        categories: HashMap<String, String>,
    ) -> Self {
        let categories = categories
            .into_iter()
            .map(|(label, canonical)| (label.to_lowercase(), canonical))
            .collect();

        Self {
            database,
            table,
            categories,
        }
    }

    pub fn resolve(&self, row: &InputRow) -> Result<PlannedRow> {
        let object_type = match self.categories.get(&row.object_type.to_lowercase()) {
            Some(canonical) => canonical.clone(),
            None => {
                tracing::warn!(
                    row_id = %row.row_id,
                    business_unit = %row.business_unit,
                    object_type = %row.object_type,
                    "ObjectType not recognized. Skipping row."
                );
                return Err(ReconError::CategoryLookup {
                    row_id: row.row_id.clone(),
                    object_type: row.object_type.clone(),
                });
            }
        };

        let bu = sanitize(&row.business_unit);
        let object = sanitize(&object_type);
        let target = TableTarget {
            database: self.database.render(&bu, &object),
            table: self.table.render(&bu, &object),
        };

        Ok(PlannedRow {
            input: row.clone(),
            object_type,
            target,
        })
    }
}
