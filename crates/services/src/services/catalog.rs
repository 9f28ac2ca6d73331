//! Built-in resource kinds of the CRM, certificate and service-dispatch apps.

use serde::Deserialize;
use serde_json::json;

use super::schema::{
    FieldSpec,
    FieldType::{Boolean, Date, Enum, Json, Number, String as Text},
    SchemaDefinition,
};

const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";

fn definition(name: &str, plural: &str, fields: Vec<FieldSpec>) -> SchemaDefinition {
    SchemaDefinition {
        name: name.to_string(),
        plural: plural.to_string(),
        group_key: None,
        fields,
    }
}

fn required<'a>(names: &'a [&'a str]) -> impl Iterator<Item = FieldSpec> + 'a {
    names.iter().map(|name| FieldSpec::required(name, Text))
}

pub fn event() -> SchemaDefinition {
    definition(
        "event",
        "events",
        vec![
            FieldSpec::required("title", Text),
            FieldSpec::required("date", Date),
            FieldSpec::optional("calendarId", Text),
        ],
    )
}

pub fn chat_message() -> SchemaDefinition {
    SchemaDefinition {
        group_key: Some("chatId".to_string()),
        ..definition(
            "chat message",
            "chat-messages",
            vec![
                FieldSpec::required("sender", Enum).with_values(&["user", "ai"]),
                FieldSpec::required("content", Text),
                FieldSpec::optional("edited", Boolean).with_default(json!(false)),
                FieldSpec::required("chatId", Text),
                FieldSpec::optional("chatTitle", Text),
            ],
        )
    }
}

pub fn certificate() -> SchemaDefinition {
    let mut fields: Vec<FieldSpec> = required(&[
        "certificateNo",
        "customerName",
        "siteLocation",
        "makeModel",
        "range",
        "serialNo",
        "calibrationGas",
        "gasCanisterDetails",
    ])
    .collect();
    fields.extend([
        FieldSpec::required("dateOfCalibration", Date),
        FieldSpec::required("calibrationDueDate", Date),
        FieldSpec::required("observations", Json),
        FieldSpec::required("engineerName", Text),
        FieldSpec::required("status", Text),
        FieldSpec::optional("companyId", Text),
    ]);
    definition("certificate", "certificates", fields)
}

pub fn service() -> SchemaDefinition {
    let mut fields: Vec<FieldSpec> = required(&[
        "serviceId",
        "customerName",
        "customerLocation",
        "contactPerson",
        "contactNumber",
        "serviceEngineer",
    ])
    .collect();
    fields.push(FieldSpec::required("date", Date));
    fields.extend(required(&[
        "place",
        "placeOptions",
        "natureOfJob",
        "reportNo",
        "makeModelNumberoftheInstrumentQuantity",
        "serialNumberoftheInstrumentCalibratedOK",
        "serialNumberoftheFaultyNonWorkingInstruments",
        "engineerReport",
        "customerReport",
    ]));
    fields.extend([
        FieldSpec::required("engineerRemarks", Json),
        FieldSpec::required("engineerName", Text),
        FieldSpec::optional("status", Text).with_default(json!("checked")),
    ]);
    definition("service", "services", fields)
}

pub fn company() -> SchemaDefinition {
    definition(
        "company",
        "companies",
        vec![
            FieldSpec::required("companyName", Text),
            FieldSpec::required("address", Text),
            FieldSpec::optional("gstNumber", Text),
            FieldSpec::required("industries", Text),
            FieldSpec::optional("website", Text),
            FieldSpec::required("industriesType", Text),
            FieldSpec::required("flag", Text),
        ],
    )
}

pub fn contact() -> SchemaDefinition {
    let mut fields: Vec<FieldSpec> = required(&["firstName", "contactNo"]).collect();
    fields.push(FieldSpec::required("email", Text).with_pattern(EMAIL_PATTERN));
    fields.extend(required(&["designation", "company"]));
    definition("contact", "contacts", fields)
}

pub fn complaint() -> SchemaDefinition {
    definition(
        "complaint",
        "complaints",
        vec![
            FieldSpec::required("companyName", Text),
            FieldSpec::required("complainerName", Text),
            FieldSpec::optional("contactNumber", Text),
            FieldSpec::required("emailAddress", Text).with_pattern(EMAIL_PATTERN),
            FieldSpec::required("subject", Text),
            FieldSpec::optional("date", Date),
            FieldSpec::optional("caseStatus", Enum)
                .with_values(&["Pending", "Resolved", "In Progress"])
                .with_default(json!("Pending")),
            FieldSpec::optional("priority", Enum)
                .with_values(&["High", "Medium", "Low"])
                .with_default(json!("Medium")),
            FieldSpec::optional("caseOrigin", Text),
        ],
    )
}

pub fn engineer() -> SchemaDefinition {
    definition(
        "engineer",
        "engineers",
        vec![
            FieldSpec::required("engineerName", Text),
            FieldSpec::required("address", Text),
            FieldSpec::required("contactNumber", Text),
            FieldSpec::required("email", Text),
            FieldSpec::required("city", Text),
        ],
    )
}

pub fn payment() -> SchemaDefinition {
    SchemaDefinition {
        group_key: Some("engineerId".to_string()),
        ..definition(
            "payment",
            "payments",
            vec![
                FieldSpec::required("engineerId", Text),
                FieldSpec::required("engineerName", Text),
                FieldSpec::required("amount", Number),
                FieldSpec::required("date", Date),
            ],
        )
    }
}

pub fn lead() -> SchemaDefinition {
    definition(
        "lead",
        "leads",
        vec![
            FieldSpec::required("companyName", Text),
            FieldSpec::required("customerName", Text),
            FieldSpec::optional("contactNumber", Text),
            FieldSpec::required("emailAddress", Text).with_pattern(EMAIL_PATTERN),
            FieldSpec::required("address", Text),
            FieldSpec::required("productName", Text),
            FieldSpec::required("amount", Number),
            FieldSpec::optional("gstNumber", Text),
            FieldSpec::optional("status", Enum)
                .with_values(&["New", "Discussion", "Demo", "Proposal", "Decided"]),
            FieldSpec::required("date", Date),
            FieldSpec::optional("endDate", Date),
            FieldSpec::optional("notes", Text).with_default(json!("")),
            FieldSpec::optional("isActive", Boolean).with_default(json!(true)),
        ],
    )
}

/// Every built-in definition, in registration order.
pub fn builtin_definitions() -> Vec<SchemaDefinition> {
    vec![
        event(),
        chat_message(),
        certificate(),
        service(),
        company(),
        contact(),
        complaint(),
        engineer(),
        payment(),
        lead(),
    ]
}

/// Layout of a resource definition file:
///
/// ```toml
/// [[resources]]
/// name = "ticket"
/// plural = "tickets"
///
/// [[resources.fields]]
/// name = "title"
/// type = "string"
/// required = true
/// ```
#[derive(Debug, Deserialize)]
pub struct DefinitionFile {
    #[serde(default)]
    pub resources: Vec<SchemaDefinition>,
}

impl DefinitionFile {
    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }
}
