//! Mapping files and spreadsheet rows
//!
//! A mapping names the target page, the recorded steps and an optional
//! success signal. Rows come from a CSV file whose header cells are the field
//! keys the steps bind to.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use formfill_core_types::{FillStep, RowData, Scalar, SuccessConfig};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::errors::MappingError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mapping {
    pub name: String,
    pub target_url: String,
    pub steps: Vec<FillStep>,
    #[serde(default)]
    pub success: Option<SuccessConfig>,
}

impl Mapping {
    /// Parse a mapping document. JSON is accepted as well as YAML.
    pub fn parse(raw: &str) -> Result<Self, MappingError> {
        serde_yaml::from_str(raw).map_err(|err| MappingError::Parse(err.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, MappingError> {
        let raw = std::fs::read_to_string(path).map_err(|source| MappingError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mapping = Self::parse(&raw)?;
        info!(
            mapping = %mapping.name,
            steps = mapping.steps.len(),
            "loaded mapping from {}",
            path.display()
        );
        Ok(mapping)
    }

    /// Check the mapping is replayable, reporting every problem at once.
    pub fn validate(&self) -> Result<(), MappingError> {
        let mut issues = Vec::new();

        if self.name.trim().is_empty() {
            issues.push("mapping name is empty".to_string());
        }
        if let Err(err) = Url::parse(&self.target_url) {
            issues.push(format!("targetUrl '{}' is not a valid url: {}", self.target_url, err));
        }
        if self.steps.is_empty() {
            issues.push("mapping has no steps".to_string());
        }

        let mut orders: HashMap<i64, &str> = HashMap::new();
        for step in &self.steps {
            let id = step.id.as_str();
            if let Some(previous) = orders.insert(step.step_order, id) {
                issues.push(format!(
                    "steps '{}' and '{}' share stepOrder {}",
                    previous, id, step.step_order
                ));
            }
            if step.action.targets_element() && step.primary.is_blank() {
                issues.push(format!("step '{}' ({}) has an empty selector", id, step.action.name()));
            }
            if step.source_field_key.is_some() && step.fixed_value.is_some() {
                issues.push(format!(
                    "step '{}' sets both sourceFieldKey and fixedValue",
                    id
                ));
            }
        }

        if let Some(success) = &self.success {
            if let Err(err) = success.validate() {
                issues.push(err.to_string());
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(MappingError::Invalid(issues))
        }
    }
}

/// Read rows from CSV. Header cells become field keys; cells go through
/// [`Scalar::infer`].
pub fn read_rows<R: Read>(reader: R) -> Result<Vec<RowData>, MappingError> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);
    let headers = csv.headers()?.clone();

    let mut rows = Vec::new();
    for record in csv.records() {
        let record = record?;
        let row: RowData = headers
            .iter()
            .enumerate()
            .map(|(index, key)| {
                let cell = record.get(index).map(Scalar::infer).unwrap_or_default();
                (key.to_string(), cell)
            })
            .collect();
        rows.push(row);
    }
    debug!(rows = rows.len(), columns = headers.len(), "parsed csv rows");
    Ok(rows)
}

pub fn load_rows(path: &Path) -> Result<Vec<RowData>, MappingError> {
    let file = std::fs::File::open(path).map_err(|source| MappingError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    read_rows(file)
}

/// Keep only the 1-based `row` when one is requested.
pub fn select_rows(rows: Vec<RowData>, row: Option<usize>) -> Result<Vec<(usize, RowData)>, MappingError> {
    let available = rows.len();
    let mut numbered = rows.into_iter().enumerate().map(|(index, row)| (index + 1, row));
    match row {
        None => Ok(numbered.collect()),
        Some(requested) => numbered
            .find(|(number, _)| *number == requested)
            .map(|picked| vec![picked])
            .ok_or(MappingError::RowOutOfRange {
                requested,
                available,
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formfill_core_types::{StepAction, SuccessTrigger};

    const MAPPING: &str = r##"
name: cadastro
targetUrl: https://example.test/form
steps:
  - id: 1
    action: fill
    primary: { kind: css, value: "#nome" }
    fallbacks:
      - { kind: xpath, value: "//input[@name='nome']" }
    sourceFieldKey: nome
    stepOrder: 1
  - id: aceite
    action: fill
    primary: { kind: css, value: "#aceite" }
    sourceFieldKey: aceite
    stepOrder: 2
    optional: true
  - id: enviar
    action: click
    primary: { kind: css, value: "button[type=submit]" }
    stepOrder: 3
success:
  trigger: url_change
  pattern: obrigado
"##;

    #[test]
    fn parses_yaml_mapping() {
        let mapping = Mapping::parse(MAPPING).unwrap();
        assert_eq!(mapping.steps.len(), 3);
        assert_eq!(mapping.steps[0].id.as_str(), "1");
        assert_eq!(mapping.steps[0].fallbacks.len(), 1);
        assert!(mapping.steps[1].optional);
        assert_eq!(mapping.steps[2].action, StepAction::Click);
        let success = mapping.success.as_ref().unwrap();
        assert_eq!(success.trigger, SuccessTrigger::UrlChange);
        assert_eq!(success.timeout_ms, 30_000);
        mapping.validate().unwrap();
    }

    #[test]
    fn accepts_json_documents() {
        let raw = r##"{"name":"x","targetUrl":"https://example.test","steps":[
            {"id":"w","action":"wait","primary":{"kind":"css","value":""},"stepOrder":1,"waitMs":200}
        ]}"##;
        let mapping = Mapping::parse(raw).unwrap();
        assert_eq!(mapping.steps[0].wait_ms, Some(200));
        mapping.validate().unwrap();
    }

    #[test]
    fn validation_collects_all_issues() {
        let mut mapping = Mapping::parse(MAPPING).unwrap();
        mapping.target_url = "not a url".into();
        mapping.steps[1].step_order = 1;
        mapping.steps[2].primary.value = "  ".into();
        mapping.steps[0].fixed_value = Some("fixo".into());
        mapping.success = Some(SuccessConfig::new(SuccessTrigger::ElementDisappears));

        let Err(MappingError::Invalid(issues)) = mapping.validate() else {
            panic!("expected validation failure");
        };
        assert_eq!(issues.len(), 5, "{issues:?}");
        assert!(issues.iter().any(|i| i.contains("share stepOrder 1")));
        assert!(issues.iter().any(|i| i.contains("empty selector")));
        assert!(issues.iter().any(|i| i.contains("both sourceFieldKey and fixedValue")));
    }

    #[test]
    fn empty_steps_are_rejected() {
        let mut mapping = Mapping::parse(MAPPING).unwrap();
        mapping.steps.clear();
        assert!(mapping.validate().is_err());
    }

    #[test]
    fn csv_cells_are_typed() {
        let csv = "nome, idade ,aceite,cep,obs\nAna,42,true,01310-100,\nBruno,,false,00123,sim\n";
        let rows = read_rows(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("nome"), Some(&Scalar::from("Ana")));
        assert_eq!(rows[0].get("idade"), Some(&Scalar::from(42i64)));
        assert_eq!(rows[0].get("aceite"), Some(&Scalar::Bool(true)));
        assert_eq!(rows[0].get("obs"), Some(&Scalar::Null));
        assert_eq!(rows[1].get("idade"), Some(&Scalar::Null));
        assert_eq!(rows[1].get("cep"), Some(&Scalar::from("00123")));
        assert_eq!(rows[1].get("obs"), Some(&Scalar::from("sim")));
    }

    #[test]
    fn csv_cells_keep_their_written_form() {
        let csv = "phone,price,id,code\n+5511987654321,1.50,12345678901234567890,1e3\n";
        let row = read_rows(csv.as_bytes()).unwrap().remove(0);
        let text = |key: &str| row.get(key).map(Scalar::as_text);
        assert_eq!(text("phone").as_deref(), Some("+5511987654321"));
        assert_eq!(text("price").as_deref(), Some("1.50"));
        assert_eq!(text("id").as_deref(), Some("12345678901234567890"));
        assert_eq!(text("code").as_deref(), Some("1e3"));
    }

    #[test]
    fn row_selection_is_one_based() {
        let rows = vec![RowData::new().with("n", 1i64), RowData::new().with("n", 2i64)];
        let picked = select_rows(rows.clone(), Some(2)).unwrap();
        assert_eq!(picked, vec![(2, rows[1].clone())]);
        assert_eq!(select_rows(rows.clone(), None).unwrap().len(), 2);
        assert!(matches!(
            select_rows(rows, Some(3)),
            Err(MappingError::RowOutOfRange { requested: 3, available: 2 })
        ));
    }
}
