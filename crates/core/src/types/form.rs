//! The affidavit form as attested by the customer.
//!
//! An [`AffidavitForm`] is the legal record of what was signed. It is stored
//! verbatim inside the submission record and never edited afterwards, so the
//! serialized field names (camelCase) are part of the persisted layout.

use std::collections::HashMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use super::email::{Email, EmailError};
use super::product_code::ProductCodes;

/// Form fields that must be present and non-blank, by wire name.
pub const REQUIRED_FIELDS: &[&str] = &[
    "name",
    "company",
    "address1",
    "city",
    "state",
    "postal",
    "country",
    "telephone",
    "email",
    "productCodes",
    "contactTissue",
    "howForm",
    "implanted",
    "protocol",
    "printName",
    "signature",
    "title",
    "date",
];

/// Validation errors for a submitted form.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FormError {
    /// A required field is missing or blank.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// A field is present but cannot be interpreted.
    #[error("Invalid field {field}: {reason}")]
    InvalidField {
        /// Wire name of the field.
        field: &'static str,
        /// Human-readable reason.
        reason: String,
    },

    /// The contact email is not an email address.
    #[error("Invalid email: {0}")]
    Email(#[from] EmailError),

    /// `implanted` is "Yes" but no duration was given.
    #[error("Implant days required when implanted is Yes")]
    MissingImplantDays,

    /// The product code list parsed to nothing.
    #[error("At least one product code is required")]
    NoProductCodes,
}

/// Snapshot of everything the submitter entered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffidavitForm {
    // Contact information
    pub name: String,
    pub company: String,
    pub address1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal: String,
    pub country: String,
    pub telephone: String,
    pub email: String,

    // Product use declaration
    /// Product codes exactly as typed (comma-delimited).
    pub product_codes: String,
    pub contact_tissue: String,
    pub how_form: String,
    pub implanted: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_days"
    )]
    pub implant_days: Option<u32>,
    pub protocol: String,

    // Attestation
    pub print_name: String,
    /// Signature image as base64, optionally a `data:image/...;base64,` URL.
    pub signature: String,
    pub title: String,
    pub date: String,
}

impl AffidavitForm {
    /// Build a form from raw string fields (urlencoded or multipart body).
    ///
    /// Missing fields become empty strings here; [`validate`](Self::validate)
    /// reports them. Only `implantDays` is parsed eagerly.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::InvalidField`] if `implantDays` is not a number.
    pub fn from_fields(fields: &HashMap<String, String>) -> Result<Self, FormError> {
        let text = |key: &str| {
            fields
                .get(key)
                .map(|v| v.trim().to_owned())
                .unwrap_or_default()
        };
        let optional = |key: &str| {
            fields
                .get(key)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        let implant_days = optional("implantDays")
            .map(|raw| {
                raw.parse::<u32>().map_err(|e| FormError::InvalidField {
                    field: "implantDays",
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        Ok(Self {
            name: text("name"),
            company: text("company"),
            address1: text("address1"),
            address2: optional("address2"),
            city: text("city"),
            state: text("state"),
            postal: text("postal"),
            country: text("country"),
            telephone: text("telephone"),
            email: text("email"),
            product_codes: text("productCodes"),
            contact_tissue: text("contactTissue"),
            how_form: text("howForm"),
            implanted: text("implanted"),
            implant_days,
            protocol: text("protocol"),
            print_name: text("printName"),
            // Signatures are data URLs; never trim inside them, only the ends.
            signature: text("signature"),
            title: text("title"),
            date: text("date"),
        })
    }

    /// Validate the form and return the product codes it covers.
    ///
    /// # Errors
    ///
    /// Returns the first problem found, checking required fields in
    /// [`REQUIRED_FIELDS`] order.
    pub fn validate(&self) -> Result<ProductCodes, FormError> {
        for field in REQUIRED_FIELDS {
            if self.field(field).is_none_or(|v| v.trim().is_empty()) {
                return Err(FormError::MissingField(field));
            }
        }

        Email::parse(&self.email)?;

        if self.implanted.eq_ignore_ascii_case("yes") && self.implant_days.is_none() {
            return Err(FormError::MissingImplantDays);
        }

        self.signature_bytes()?;

        let codes = ProductCodes::parse_delimited(&self.product_codes);
        if codes.is_empty() {
            return Err(FormError::NoProductCodes);
        }
        Ok(codes)
    }

    /// Decode the signature image.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::InvalidField`] when the payload is not base64.
    pub fn signature_bytes(&self) -> Result<Vec<u8>, FormError> {
        let payload = self
            .signature
            .split_once(";base64,")
            .map_or(self.signature.as_str(), |(_, data)| data);

        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|e| FormError::InvalidField {
                field: "signature",
                reason: e.to_string(),
            })?;
        if bytes.is_empty() {
            return Err(FormError::MissingField("signature"));
        }
        Ok(bytes)
    }

    /// Look up a required text field by wire name.
    fn field(&self, name: &str) -> Option<&str> {
        let value = match name {
            "name" => &self.name,
            "company" => &self.company,
            "address1" => &self.address1,
            "city" => &self.city,
            "state" => &self.state,
            "postal" => &self.postal,
            "country" => &self.country,
            "telephone" => &self.telephone,
            "email" => &self.email,
            "productCodes" => &self.product_codes,
            "contactTissue" => &self.contact_tissue,
            "howForm" => &self.how_form,
            "implanted" => &self.implanted,
            "protocol" => &self.protocol,
            "printName" => &self.print_name,
            "signature" => &self.signature,
            "title" => &self.title,
            "date" => &self.date,
            _ => return None,
        };
        Some(value)
    }
}

/// Older records stored `implantDays` as the raw form string, or as whatever
/// integer it parsed to (negative included). Values that do not fit a day
/// count read as `None` so one odd record cannot make the document unreadable.
fn lenient_days<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Integer(i64),
        Float(f64),
        Text(String),
        Other(serde::de::IgnoredAny),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Integer(n)) => u32::try_from(n).ok(),
        Some(Raw::Text(s)) => s
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(|n| u32::try_from(n).ok()),
        None | Some(Raw::Float(_) | Raw::Other(_)) => None,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// 1x1 transparent PNG.
    const PIXEL: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

    fn fields() -> HashMap<String, String> {
        [
            ("name", "Dana Reyes"),
            ("company", "Reyes Surgical"),
            ("address1", "12 Harbor Rd"),
            ("city", "Lake Havasu"),
            ("state", "AZ"),
            ("postal", "86403"),
            ("country", "US"),
            ("telephone", "555-0100"),
            ("email", "dana@reyes.example"),
            ("productCodes", "FII-1001, FII-1002"),
            ("contactTissue", "Yes"),
            ("howForm", "Cured"),
            ("implanted", "No"),
            ("protocol", "Bench testing only"),
            ("printName", "Dana Reyes"),
            ("title", "Director"),
            ("date", "2024-01-01"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .chain([(
            "signature".to_owned(),
            format!("data:image/png;base64,{PIXEL}"),
        )])
        .collect()
    }

    #[test]
    fn test_valid_form_yields_codes() {
        let form = AffidavitForm::from_fields(&fields()).unwrap();
        let codes = form.validate().unwrap();
        assert_eq!(codes.join(","), "FII-1001,FII-1002");
    }

    #[test]
    fn test_missing_field_named_in_error() {
        let mut f = fields();
        f.remove("printName");
        let form = AffidavitForm::from_fields(&f).unwrap();
        assert_eq!(
            form.validate(),
            Err(FormError::MissingField("printName"))
        );
        assert_eq!(
            FormError::MissingField("printName").to_string(),
            "Missing required field: printName"
        );
    }

    #[test]
    fn test_blank_field_is_missing() {
        let mut f = fields();
        f.insert("company".to_owned(), "   ".to_owned());
        let form = AffidavitForm::from_fields(&f).unwrap();
        assert_eq!(form.validate(), Err(FormError::MissingField("company")));
    }

    #[test]
    fn test_implanted_requires_days() {
        let mut f = fields();
        f.insert("implanted".to_owned(), "Yes".to_owned());
        let form = AffidavitForm::from_fields(&f).unwrap();
        assert_eq!(form.validate(), Err(FormError::MissingImplantDays));

        f.insert("implantDays".to_owned(), "30".to_owned());
        let form = AffidavitForm::from_fields(&f).unwrap();
        assert_eq!(form.implant_days, Some(30));
        assert!(form.validate().is_ok());
    }

    #[test]
    fn test_implant_days_must_be_numeric() {
        let mut f = fields();
        f.insert("implantDays".to_owned(), "thirty".to_owned());
        assert!(matches!(
            AffidavitForm::from_fields(&f),
            Err(FormError::InvalidField {
                field: "implantDays",
                ..
            })
        ));
    }

    #[test]
    fn test_bad_email_rejected() {
        let mut f = fields();
        f.insert("email".to_owned(), "not-an-email".to_owned());
        let form = AffidavitForm::from_fields(&f).unwrap();
        assert!(matches!(form.validate(), Err(FormError::Email(_))));
    }

    #[test]
    fn test_codes_that_parse_to_nothing() {
        let mut f = fields();
        f.insert("productCodes".to_owned(), " , ,".to_owned());
        let form = AffidavitForm::from_fields(&f).unwrap();
        assert_eq!(form.validate(), Err(FormError::NoProductCodes));
    }

    #[test]
    fn test_signature_accepts_bare_base64() {
        let mut f = fields();
        f.insert("signature".to_owned(), PIXEL.to_owned());
        let form = AffidavitForm::from_fields(&f).unwrap();
        assert!(!form.signature_bytes().unwrap().is_empty());
    }

    #[test]
    fn test_signature_rejects_garbage() {
        let mut f = fields();
        f.insert("signature".to_owned(), "data:image/png;base64,@@@".to_owned());
        let form = AffidavitForm::from_fields(&f).unwrap();
        assert!(matches!(
            form.validate(),
            Err(FormError::InvalidField {
                field: "signature",
                ..
            })
        ));
    }

    #[test]
    fn test_camel_case_wire_names() {
        let form = AffidavitForm::from_fields(&fields()).unwrap();
        let json = serde_json::to_value(&form).unwrap();
        assert!(json.get("printName").is_some());
        assert!(json.get("contactTissue").is_some());
        assert!(json.get("address2").is_none());
        assert!(json.get("implantDays").is_none());
    }

    #[test]
    fn test_implant_days_read_from_string() {
        let mut json = serde_json::to_value(AffidavitForm::from_fields(&fields()).unwrap()).unwrap();
        json["implantDays"] = serde_json::Value::String("14".to_owned());
        let form: AffidavitForm = serde_json::from_value(json).unwrap();
        assert_eq!(form.implant_days, Some(14));
    }

    #[test]
    fn test_implant_days_out_of_range_reads_as_none() {
        let mut json = serde_json::to_value(AffidavitForm::from_fields(&fields()).unwrap()).unwrap();
        for raw in [
            serde_json::json!(-3),
            serde_json::json!("-3"),
            serde_json::json!("abc"),
            serde_json::json!(1.5),
            serde_json::json!(true),
            serde_json::Value::Null,
        ] {
            json["implantDays"] = raw.clone();
            let form: AffidavitForm = serde_json::from_value(json.clone()).unwrap();
            assert_eq!(form.implant_days, None, "implantDays = {raw}");
        }
    }
}
