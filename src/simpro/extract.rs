// src/simpro/extract.rs
//! Map job payloads of varying shape onto `JobRecord`.
//!
//! Tenants and API versions disagree on key names and casing, so every field
//! is read from an ordered list of candidate keys. Dotted keys walk nested
//! objects.

use serde_json::Value;

use crate::types::JobRecord;

const ID_KEYS: &[&str] = &["id", "jobId", "ID"];
const CODE_KEYS: &[&str] = &["jobNumber", "code", "number", "jobCode"];
const NAME_KEYS: &[&str] = &["name", "jobName", "title", "Name"];
const CLIENT_KEYS: &[&str] = &[
    "customer.name",
    "customer.companyName",
    "customerName",
    "client.name",
    "clientName",
    "Customer.CompanyName",
];
const REVENUE_KEYS: &[&str] = &[
    "quotedPriceExTax",
    "contractPriceExTax",
    "sellPriceExTax",
    "exTaxTotal",
    "Totals.ExTaxTotal",
    "totalExTax",
    "sellExTax",
    "Total.ExTax",
];
const ESTIMATED_COST_KEYS: &[&str] = &[
    "estimatedCostExTax",
    "estimatedCostsExTax",
    "estimatedCost",
    "budget.exTaxCost",
    "Totals.CostExTax",
    "totalCostEstimatedExTax",
];
const ACTUAL_COST_KEYS: &[&str] = &[
    "actualCostToDateExTax",
    "actualCostExTax",
    "costToDateExTax",
    "costToDate",
    "Totals.ActualCostExTax",
];
const ESTIMATED_HOURS_KEYS: &[&str] = &["estimatedHours", "totalHoursEstimated", "budget.estimatedHours"];
const ACTUAL_HOURS_KEYS: &[&str] = &["actualHoursToDate", "actualHours", "hoursToDate"];

const STAGE_KEYS: &[&str] = &[
    "stageName",
    "Stage",
    "jobStage",
    "jobStageName",
    "currentStage",
    "status",
    "statusName",
];
const TYPE_KEYS: &[&str] = &["type", "jobType", "jobTypeName", "TypeName", "Type"];

fn lookup<'v>(value: &'v Value, key: &str) -> Option<&'v Value> {
    let mut node = value;
    for part in key.split('.') {
        node = node.as_object()?.get(part)?;
    }
    if node.is_null() {
        None
    } else {
        Some(node)
    }
}

fn as_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

/// Text for a scalar; objects contribute their `name`, or nothing without one
fn as_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Object(map) => map
            .get("name")
            .or_else(|| map.get("Name"))
            .map(as_text)
            .unwrap_or_default(),
        other => other.to_string(),
    }
}

/// First candidate key that holds something convertible to a number
pub fn first_number(value: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .filter_map(|key| lookup(value, key))
        .find_map(as_number)
}

/// First candidate key that is present and not null, as trimmed text
pub fn first_text(value: &Value, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| lookup(value, key))
        .map(as_text)
        .unwrap_or_default()
}

/// Normalized stage from every stage-like key. Without a recognised keyword
/// the `stage` key's own text is used, or "Unknown" when it is blank.
pub fn infer_stage(value: &Value) -> String {
    let mut candidates: Vec<String> = vec![lookup(value, "stage").map(as_text).unwrap_or_default()];
    for key in STAGE_KEYS {
        if let Some(v) = lookup(value, key) {
            candidates.push(as_text(v));
        }
    }

    let text = candidates.join(" ").to_lowercase();
    if text.contains("archive") {
        "Archived".to_string()
    } else if text.contains("complete") {
        "Complete".to_string()
    } else if text.contains("progress") {
        "In Progress".to_string()
    } else if text.contains("pending") {
        "Pending".to_string()
    } else if candidates[0].is_empty() {
        "Unknown".to_string()
    } else {
        candidates.swap_remove(0)
    }
}

pub fn infer_type(value: &Value) -> String {
    for key in TYPE_KEYS {
        if let Some(Value::String(s)) = lookup(value, key) {
            if !s.trim().is_empty() {
                return s.trim().to_string();
            }
        }
    }

    ["jobType.name", "typeObj.name"]
        .iter()
        .find_map(|key| lookup(value, key))
        .map(as_text)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "Unknown".to_string())
}

pub fn extract_job_fields(value: &Value) -> JobRecord {
    let estimated_revenue = first_number(value, REVENUE_KEYS);
    let estimated_cost = first_number(value, ESTIMATED_COST_KEYS);
    let actual_cost = first_number(value, ACTUAL_COST_KEYS);

    let revenue_base = estimated_revenue.filter(|rev| *rev > 0.0);
    let gm_estimated_pct = revenue_base
        .zip(estimated_cost)
        .map(|(rev, cost)| (rev - cost) / rev);
    let gm_actual_pct = revenue_base
        .zip(actual_cost)
        .map(|(rev, cost)| (rev - cost) / rev);
    let cost_to_complete = estimated_cost
        .zip(actual_cost)
        .map(|(est, act)| (est - act).max(0.0));
    let burn_pct = estimated_cost
        .filter(|est| *est > 0.0)
        .zip(actual_cost)
        .map(|(est, act)| act / est);

    JobRecord {
        job_id: first_number(value, ID_KEYS).map(|id| id as i64).unwrap_or(0),
        job_code: first_text(value, CODE_KEYS),
        job_name: first_text(value, NAME_KEYS),
        client_name: first_text(value, CLIENT_KEYS),
        stage: infer_stage(value),
        job_type: infer_type(value),
        estimated_revenue: estimated_revenue.unwrap_or(0.0),
        estimated_cost: estimated_cost.unwrap_or(0.0),
        actual_cost_to_date: actual_cost.unwrap_or(0.0),
        estimated_hours: first_number(value, ESTIMATED_HOURS_KEYS).unwrap_or(0.0),
        actual_hours: first_number(value, ACTUAL_HOURS_KEYS).unwrap_or(0.0),
        hours_today: 0.0,
        cost_today: 0.0,
        gm_estimated_pct,
        gm_actual_pct,
        cost_to_complete,
        burn_pct,
    }
}

/// Pending or in-progress project work; service jobs and unknown stages are skipped
pub fn is_active_project(record: &JobRecord) -> bool {
    let stage = record.stage.to_lowercase();
    let job_type = record.job_type.to_lowercase();

    if job_type.contains("service") {
        return false;
    }
    if stage.contains("archiv") || stage.contains("complete") {
        return false;
    }
    stage.contains("pending") || stage.contains("progress")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_first_number_walks_keys_and_paths() {
        let payload = json!({
            "estimatedCost": null,
            "budget": { "exTaxCost": "1250.50" },
            "Totals": { "CostExTax": 99 }
        });
        assert_eq!(first_number(&payload, ESTIMATED_COST_KEYS), Some(1250.5));
        assert_eq!(first_number(&payload, &["missing", "Totals.CostExTax"]), Some(99.0));
        assert_eq!(first_number(&payload, &["budget"]), None);
    }

    #[test]
    fn test_first_number_skips_unparseable_values() {
        let payload = json!({ "actualHours": "n/a", "hoursToDate": 12 });
        assert_eq!(first_number(&payload, ACTUAL_HOURS_KEYS), Some(12.0));
    }

    #[test]
    fn test_first_text_takes_first_present_key() {
        let payload = json!({ "customerName": "  Smith Builders ", "client": { "name": "Other" } });
        assert_eq!(first_text(&payload, CLIENT_KEYS), "Smith Builders");
        assert_eq!(first_text(&payload, &["nope"]), "");
        assert_eq!(first_text(&json!({ "jobNumber": 4411 }), CODE_KEYS), "4411");
    }

    #[test]
    fn test_infer_stage_variants() {
        assert_eq!(infer_stage(&json!({ "stage": { "name": "Progress" } })), "In Progress");
        assert_eq!(infer_stage(&json!({ "Stage": "Pending" })), "Pending");
        assert_eq!(infer_stage(&json!({ "status": "Completed" })), "Complete");
        assert_eq!(
            infer_stage(&json!({ "stage": "In Progress", "statusName": "Archived" })),
            "Archived"
        );
        assert_eq!(infer_stage(&json!({ "stage": "Quoted", "status": "Open" })), "Quoted");
        assert_eq!(infer_stage(&json!({ "jobStage": "Quoted" })), "Unknown");
        assert_eq!(infer_stage(&json!({})), "Unknown");
    }

    #[test]
    fn test_stage_object_without_name_is_blank() {
        assert_eq!(infer_stage(&json!({ "stage": { "id": 3 } })), "Unknown");
        assert_eq!(
            infer_stage(&json!({ "stage": { "id": 3 }, "status": "Pending" })),
            "Pending"
        );
        assert_eq!(first_text(&json!({ "customer": { "id": 9 } }), &["customer"]), "");
    }

    #[test]
    fn test_infer_type_variants() {
        assert_eq!(infer_type(&json!({ "type": "Project" })), "Project");
        assert_eq!(infer_type(&json!({ "jobType": { "name": "Service" } })), "Service");
        assert_eq!(infer_type(&json!({ "type": "", "typeObj": { "name": "Prepaid" } })), "Prepaid");
        assert_eq!(infer_type(&json!({ "Type": "Project" })), "Project");
        assert_eq!(infer_type(&json!({ "type": 3 })), "Unknown");
    }

    #[test]
    fn test_extract_derives_margins() {
        let payload = json!({
            "id": 1201,
            "jobNumber": "J-1201",
            "name": "Kitchen refit",
            "customer": { "companyName": "Acme Pty Ltd" },
            "stage": "In Progress",
            "type": "Project",
            "quotedPriceExTax": 20000,
            "estimatedCostExTax": 15000,
            "actualCostToDateExTax": 12000,
            "estimatedHours": 120,
            "actualHoursToDate": "96.5"
        });
        let job = extract_job_fields(&payload);

        assert_eq!(job.job_id, 1201);
        assert_eq!(job.job_code, "J-1201");
        assert_eq!(job.client_name, "Acme Pty Ltd");
        assert_eq!(job.stage, "In Progress");
        assert_eq!(job.gm_estimated_pct, Some(0.25));
        assert_eq!(job.gm_actual_pct, Some(0.4));
        assert_eq!(job.cost_to_complete, Some(3000.0));
        assert_eq!(job.burn_pct, Some(0.8));
        assert_eq!(job.actual_hours, 96.5);
        assert_eq!(job.hours_today, 0.0);
        assert!(is_active_project(&job));
    }

    #[test]
    fn test_extract_without_amounts() {
        let job = extract_job_fields(&json!({ "ID": 7, "Name": "Bare", "actualCostExTax": 500 }));
        assert_eq!(job.job_id, 7);
        assert_eq!(job.job_name, "Bare");
        assert_eq!(job.estimated_revenue, 0.0);
        assert_eq!(job.actual_cost_to_date, 500.0);
        assert_eq!(job.gm_estimated_pct, None);
        assert_eq!(job.gm_actual_pct, None);
        assert_eq!(job.cost_to_complete, None);
        assert_eq!(job.burn_pct, None);
    }

    #[test]
    fn test_cost_to_complete_floors_at_zero() {
        let job = extract_job_fields(&json!({ "estimatedCost": 100, "costToDate": 180 }));
        assert_eq!(job.cost_to_complete, Some(0.0));
        assert_eq!(job.burn_pct, Some(1.8));
    }

    #[test]
    fn test_is_active_project_rules() {
        let job = |stage: &str, job_type: &str| JobRecord {
            stage: stage.to_string(),
            job_type: job_type.to_string(),
            ..Default::default()
        };
        assert!(is_active_project(&job("Pending", "Project")));
        assert!(is_active_project(&job("In Progress", "Unknown")));
        assert!(!is_active_project(&job("In Progress", "Service")));
        assert!(!is_active_project(&job("Complete", "Project")));
        assert!(!is_active_project(&job("Archived", "Project")));
        assert!(!is_active_project(&job("Unknown", "Project")));
    }
}
