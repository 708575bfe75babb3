use async_trait::async_trait;
use chrono::{DateTime, Duration, Months, NaiveDate, NaiveDateTime, TimeZone, Utc};
use loomcore::value::{display_string, set_path, JsonObject, Value};
use loomcore::{Item, NodeBehavior, NodeContext, NodeDescriptor, NodeError, NodeOutput, Property};
use std::fmt::Write;

/// Date arithmetic and formatting on item fields.
pub struct DateTimeNode;

/// Parse the accepted date spellings. Numbers are epoch milliseconds.
pub fn parse_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => Utc.timestamp_millis_opt(n.as_f64()? as i64).single(),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(millis) = s.parse::<i64>() {
                return Utc.timestamp_millis_opt(millis).single();
            }
            if let Ok(date) = DateTime::parse_from_rfc3339(s) {
                return Some(date.with_timezone(&Utc));
            }
            for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
                if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
                    return Some(naive.and_utc());
                }
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
        }
        _ => None,
    }
}

/// Shift `date` by `amount` units; negative amounts go back in time.
pub fn shift(date: DateTime<Utc>, amount: f64, unit: &str) -> Option<DateTime<Utc>> {
    let months = |n: f64| -> Option<DateTime<Utc>> {
        let n = n.trunc() as i64;
        let step = Months::new(u32::try_from(n.unsigned_abs()).ok()?);
        if n >= 0 {
            date.checked_add_months(step)
        } else {
            date.checked_sub_months(step)
        }
    };
    let millis_per_unit = match unit {
        "milliseconds" => 1.0,
        "seconds" => 1_000.0,
        "minutes" => 60_000.0,
        "hours" => 3_600_000.0,
        "days" => 86_400_000.0,
        "weeks" => 604_800_000.0,
        "months" => return months(amount),
        "quarters" => return months(amount * 3.0),
        "years" => return months(amount * 12.0),
        _ => return None,
    };
    let millis = amount * millis_per_unit;
    if !millis.is_finite() || millis.abs() > i64::MAX as f64 {
        return None;
    }
    date.checked_add_signed(Duration::try_milliseconds(millis as i64)?)
}

fn format_date(date: &DateTime<Utc>, format: &str) -> Result<String, NodeError> {
    let mut out = String::new();
    write!(out, "{}", date.format(format)).map_err(|_| NodeError::InvalidParameter {
        parameter: "format".to_string(),
        reason: format!("invalid date format '{}'", format),
    })?;
    Ok(out)
}

#[async_trait]
impl NodeBehavior for DateTimeNode {
    fn describe(&self) -> NodeDescriptor {
        let date_operations = [
            Value::from("formatDate"),
            Value::from("addToDate"),
            Value::from("subtractFromDate"),
        ];
        let arithmetic = [Value::from("addToDate"), Value::from("subtractFromDate")];

        NodeDescriptor::new("dateTime", "Date & Time")
            .with_description("Formats dates and performs date arithmetic")
            .with_property(Property::options(
                "operation",
                "Operation",
                "getCurrentDate",
                &[
                    ("Get Current Date", "getCurrentDate"),
                    ("Format a Date", "formatDate"),
                    ("Add to a Date", "addToDate"),
                    ("Subtract From a Date", "subtractFromDate"),
                ],
            ))
            .with_property(
                Property::string("field", "Date Field", "")
                    .required()
                    .describe("Dot path of the date to work on")
                    .show_when("operation", &date_operations),
            )
            .with_property(
                Property::string("format", "Format", "%Y-%m-%d")
                    .describe("strftime-style pattern")
                    .show_when("operation", &[Value::from("formatDate")]),
            )
            .with_property(
                Property::number("duration", "Duration", 1.0).show_when("operation", &arithmetic),
            )
            .with_property(
                Property::options(
                    "unit",
                    "Time Unit",
                    "days",
                    &[
                        ("Milliseconds", "milliseconds"),
                        ("Seconds", "seconds"),
                        ("Minutes", "minutes"),
                        ("Hours", "hours"),
                        ("Days", "days"),
                        ("Weeks", "weeks"),
                        ("Months", "months"),
                        ("Quarters", "quarters"),
                        ("Years", "years"),
                    ],
                )
                .show_when("operation", &arithmetic),
            )
            .with_property(
                Property::string("outputFieldName", "Output Field Name", "")
                    .describe("Defaults to currentDate, formattedDate or newDate"),
            )
            .with_property(Property::boolean("includeInputFields", "Include Input Fields", true))
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let mut results = Vec::with_capacity(ctx.items.len());

        for (i, item) in ctx.items.iter().enumerate() {
            let operation = ctx.get_string("operation", i);

            let input_date = || -> Result<DateTime<Utc>, NodeError> {
                let field = ctx.require_string("field", i)?;
                let raw = item.get(&field).cloned().unwrap_or(Value::Null);
                parse_date(&raw).ok_or_else(|| NodeError::InvalidDate {
                    field: field.clone(),
                    value: display_string(&raw),
                })
            };

            let (default_field, value) = match operation.as_str() {
                "getCurrentDate" => ("currentDate", Value::from(Utc::now().to_rfc3339())),
                "formatDate" => {
                    let date = input_date()?;
                    let formatted = format_date(&date, &ctx.get_string("format", i))?;
                    ("formattedDate", Value::from(formatted))
                }
                "addToDate" | "subtractFromDate" => {
                    let date = input_date()?;
                    let mut amount = ctx.get_number("duration", i);
                    if operation == "subtractFromDate" {
                        amount = -amount;
                    }
                    let unit = ctx.get_string("unit", i);
                    let shifted = shift(date, amount, &unit).ok_or_else(|| NodeError::InvalidParameter {
                        parameter: "duration".to_string(),
                        reason: format!("cannot shift date by {} {}", amount, unit),
                    })?;
                    ("newDate", Value::from(shifted.to_rfc3339()))
                }
                other => {
                    return Err(NodeError::InvalidParameter {
                        parameter: "operation".to_string(),
                        reason: format!("unknown operation '{}'", other),
                    })
                }
            };

            let mut json = if ctx.get_bool("includeInputFields", i) {
                item.json.clone()
            } else {
                JsonObject::new()
            };
            let output_field = match ctx.get_string("outputFieldName", i) {
                name if name.is_empty() => default_field.to_string(),
                name => name,
            };
            set_path(&mut json, &output_field, value);
            results.push(Item::new(json, i));
        }

        Ok(NodeOutput::single(results))
    }
}
