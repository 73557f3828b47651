//! Shopify Admin API GraphQL client.

use std::sync::Arc;

use affidavit_core::{CustomerId, OrderId, ProductCodes, ProductId};
use graphql_client::{GraphQLQuery, Response};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, instrument};

use crate::config::ShopifyConfig;
use crate::platform::CustomerContact;

use super::queries::{
    FulfillmentOrderHold, FulfillmentOrderReleaseHold, GetCustomerContact, GetCustomerMetafield,
    GetOrderFulfillmentOrders, GetProductGating, MetafieldDefinitionCreate, MetafieldsSet,
    OrderCancel, fulfillment_order_hold, fulfillment_order_release_hold, get_customer_contact,
    get_customer_metafield, get_order_fulfillment_orders, get_product_gating,
    metafield_definition_create, metafields_set, order_cancel,
};
use super::{GraphQLError, ShopifyError, check_user_errors};

/// Namespace of the merchant-managed product gating metafields.
pub const PRODUCT_NAMESPACE: &str = "affidavit";

/// Current value of a metafield together with its concurrency token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetafieldSnapshot {
    /// Raw value; `None` when the metafield does not exist.
    pub value: Option<String>,
    /// `compareDigest` of the value read.
    pub compare_digest: Option<String>,
}

/// Precondition for a metafield write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteCondition {
    /// Overwrite whatever is there.
    Unchecked,
    /// Succeed only if the metafield does not exist yet.
    Absent,
    /// Succeed only if the metafield still has this digest.
    Digest(String),
}

impl WriteCondition {
    fn into_input(self) -> Option<Option<String>> {
        match self {
            Self::Unchecked => None,
            Self::Absent => Some(None),
            Self::Digest(digest) => Some(Some(digest)),
        }
    }
}

/// A metafield definition to create.
#[derive(Debug, Clone)]
pub struct MetafieldDefinitionSpec {
    pub name: &'static str,
    pub namespace: String,
    pub key: &'static str,
    pub description: &'static str,
    /// Metafield type, e.g. `json` or `boolean`.
    pub kind: &'static str,
    /// `CUSTOMER`, `ORDER` or `PRODUCT`.
    pub owner_type: &'static str,
    /// App-reserved namespaces need explicit access grants.
    pub app_reserved: bool,
}

/// Outcome of creating a metafield definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefinitionOutcome {
    Created(String),
    AlreadyExists,
}

/// Shopify Admin API GraphQL client.
///
/// Cheap to clone; the HTTP client and credentials live behind an `Arc`.
#[derive(Clone)]
pub struct AdminClient {
    inner: Arc<AdminClientInner>,
}

struct AdminClientInner {
    client: reqwest::Client,
    endpoint: String,
    access_token: SecretString,
    namespace: String,
}

impl AdminClient {
    /// Create a new Admin API client.
    #[must_use]
    pub fn new(config: &ShopifyConfig) -> Self {
        let endpoint = format!(
            "https://{}/admin/api/{}/graphql.json",
            config.store, config.api_version
        );
        Self::with_endpoint(
            endpoint,
            config.access_token.clone(),
            config.namespace.clone(),
        )
    }

    /// Create a client against an explicit GraphQL endpoint.
    #[must_use]
    pub fn with_endpoint(
        endpoint: impl Into<String>,
        access_token: SecretString,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(AdminClientInner {
                client: reqwest::Client::new(),
                endpoint: endpoint.into(),
                access_token,
                namespace: namespace.into(),
            }),
        }
    }

    /// Namespace of the app-owned metafields.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    // =========================================================================
    // GraphQL Execution
    // =========================================================================

    /// Execute a GraphQL operation.
    async fn execute<Q: GraphQLQuery>(
        &self,
        variables: Q::Variables,
    ) -> Result<Q::ResponseData, ShopifyError> {
        let body = Q::build_query(variables);

        let response = self
            .inner
            .client
            .post(&self.inner.endpoint)
            .header(
                "X-Shopify-Access-Token",
                self.inner.access_token.expose_secret(),
            )
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            // Shopify sends fractional seconds ("2.0").
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<f64>().ok())
                .map_or(2, |secs| secs.ceil() as u64);
            return Err(ShopifyError::RateLimited(retry_after));
        }

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(ShopifyError::Unauthorized(
                "Invalid access token or missing scope".to_string(),
            ));
        }

        let text = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                operation = body.operation_name,
                body = %text.chars().take(500).collect::<String>(),
                "Shopify API returned non-success status"
            );
            return Err(ShopifyError::GraphQL(vec![GraphQLError {
                message: format!("HTTP {status}: {}", text.chars().take(200).collect::<String>()),
                path: vec![],
            }]));
        }

        let response: Response<Q::ResponseData> = serde_json::from_str(&text).map_err(|e| {
            tracing::error!(
                error = %e,
                operation = body.operation_name,
                body = %text.chars().take(500).collect::<String>(),
                "Failed to parse Shopify GraphQL response"
            );
            ShopifyError::Parse(e)
        })?;

        if let Some(errors) = response.errors
            && !errors.is_empty()
        {
            debug!(errors = ?errors, "GraphQL errors in response");
            return Err(ShopifyError::GraphQL(
                errors
                    .into_iter()
                    .map(|e| GraphQLError {
                        message: e.message,
                        path: e.path.map_or_else(Vec::new, |p| {
                            p.into_iter()
                                .map(|fragment| match fragment {
                                    graphql_client::PathFragment::Key(s) => {
                                        serde_json::Value::String(s)
                                    }
                                    graphql_client::PathFragment::Index(i) => {
                                        serde_json::Value::Number(i.into())
                                    }
                                })
                                .collect()
                        }),
                    })
                    .collect(),
            ));
        }

        response.data.ok_or_else(|| {
            ShopifyError::GraphQL(vec![GraphQLError {
                message: "No data in response".to_string(),
                path: vec![],
            }])
        })
    }

    // =========================================================================
    // Customer methods
    // =========================================================================

    /// Read an app-namespace metafield on a customer.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the customer does not exist, or the API error.
    #[instrument(skip(self), fields(customer_id = %customer, key = %key))]
    pub async fn customer_metafield(
        &self,
        customer: CustomerId,
        key: &str,
    ) -> Result<MetafieldSnapshot, ShopifyError> {
        let data = self
            .execute::<GetCustomerMetafield>(get_customer_metafield::Variables {
                id: customer.to_gid(),
                namespace: self.inner.namespace.clone(),
                key: key.to_string(),
            })
            .await?;

        let customer_data = data
            .customer
            .ok_or_else(|| ShopifyError::NotFound(format!("customer {customer}")))?;

        Ok(customer_data
            .metafield
            .map(|m| MetafieldSnapshot {
                value: Some(m.value),
                compare_digest: m.compare_digest,
            })
            .unwrap_or_default())
    }

    /// Fetch a customer's name and email.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(customer_id = %customer))]
    pub async fn customer_contact(
        &self,
        customer: CustomerId,
    ) -> Result<Option<CustomerContact>, ShopifyError> {
        let data = self
            .execute::<GetCustomerContact>(get_customer_contact::Variables {
                id: customer.to_gid(),
            })
            .await?;

        Ok(data.customer.and_then(|c| {
            let email = c.email.filter(|e| !e.trim().is_empty())?;
            let full_name = [c.first_name, c.last_name]
                .into_iter()
                .flatten()
                .filter(|part| !part.trim().is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            let name = if full_name.is_empty() {
                c.display_name.unwrap_or_else(|| email.clone())
            } else {
                full_name
            };
            Some(CustomerContact { name, email })
        }))
    }

    // =========================================================================
    // Metafield methods
    // =========================================================================

    /// Write a metafield and return its new `compareDigest`.
    ///
    /// # Errors
    ///
    /// Returns `StaleObject` when `condition` no longer holds, or the API
    /// error.
    #[instrument(skip(self, value), fields(owner = %owner_gid, namespace = %namespace, key = %key))]
    pub async fn set_metafield(
        &self,
        owner_gid: String,
        namespace: &str,
        key: &str,
        kind: &str,
        value: String,
        condition: WriteCondition,
    ) -> Result<Option<String>, ShopifyError> {
        let variables = metafields_set::Variables {
            metafields: vec![metafields_set::MetafieldsSetInput {
                owner_id: owner_gid,
                namespace: namespace.to_string(),
                key: key.to_string(),
                kind: kind.to_string(),
                value,
                compare_digest: condition.into_input(),
            }],
        };

        let payload = self
            .execute::<MetafieldsSet>(variables)
            .await?
            .metafields_set
            .ok_or_else(|| ShopifyError::UserError("metafieldsSet returned no payload".into()))?;

        check_user_errors(&payload.user_errors)?;

        Ok(payload
            .metafields
            .and_then(|m| m.into_iter().find(|m| m.key == key))
            .and_then(|m| m.compare_digest))
    }

    /// Write an app-namespace metafield.
    ///
    /// # Errors
    ///
    /// See [`set_metafield`](Self::set_metafield).
    pub async fn set_app_metafield(
        &self,
        owner_gid: String,
        key: &str,
        value: String,
        condition: WriteCondition,
    ) -> Result<Option<String>, ShopifyError> {
        let namespace = self.inner.namespace.clone();
        self.set_metafield(owner_gid, &namespace, key, "json", value, condition)
            .await
    }

    /// Create a metafield definition.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or returns user errors other
    /// than "already taken".
    #[instrument(skip(self, spec), fields(namespace = %spec.namespace, key = spec.key, owner = spec.owner_type))]
    pub async fn create_metafield_definition(
        &self,
        spec: &MetafieldDefinitionSpec,
    ) -> Result<DefinitionOutcome, ShopifyError> {
        let access = spec
            .app_reserved
            .then(|| metafield_definition_create::Access {
                admin: "MERCHANT_READ_WRITE".to_string(),
                storefront: "PUBLIC_READ".to_string(),
                customer_account: "READ".to_string(),
            });

        let variables = metafield_definition_create::Variables {
            definition: metafield_definition_create::MetafieldDefinitionInput {
                name: spec.name.to_string(),
                namespace: spec.namespace.clone(),
                key: spec.key.to_string(),
                description: spec.description.to_string(),
                kind: spec.kind.to_string(),
                owner_type: spec.owner_type.to_string(),
                access,
            },
        };

        let payload = self
            .execute::<MetafieldDefinitionCreate>(variables)
            .await?
            .metafield_definition_create
            .ok_or_else(|| {
                ShopifyError::UserError("metafieldDefinitionCreate returned no payload".into())
            })?;

        if payload
            .user_errors
            .iter()
            .any(|e| e.code.as_deref() == Some("TAKEN") || e.message.contains("already"))
        {
            return Ok(DefinitionOutcome::AlreadyExists);
        }
        check_user_errors(&payload.user_errors)?;

        payload
            .created_definition
            .map(|d| DefinitionOutcome::Created(d.id))
            .ok_or_else(|| ShopifyError::UserError("no definition created".into()))
    }

    // =========================================================================
    // Product methods
    // =========================================================================

    /// Product codes that gate a product, or `None` when it is not gated.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(product_id = %product))]
    pub async fn product_gating(
        &self,
        product: ProductId,
    ) -> Result<Option<ProductCodes>, ShopifyError> {
        let data = self
            .execute::<GetProductGating>(get_product_gating::Variables {
                id: product.to_gid(),
            })
            .await?;

        let Some(product) = data.product else {
            return Ok(None);
        };
        let gated = product
            .requires_affidavit
            .is_some_and(|v| v.value.trim().eq_ignore_ascii_case("true"));
        if !gated {
            return Ok(None);
        }

        let codes = product
            .product_codes
            .map(|v| ProductCodes::parse_metafield(&v.value))
            .unwrap_or_default();
        Ok((!codes.is_empty()).then_some(codes))
    }

    // =========================================================================
    // Order methods
    // =========================================================================

    async fn fulfillment_orders(
        &self,
        order: OrderId,
    ) -> Result<Vec<get_order_fulfillment_orders::FulfillmentOrder>, ShopifyError> {
        let data = self
            .execute::<GetOrderFulfillmentOrders>(get_order_fulfillment_orders::Variables {
                id: order.to_gid(),
            })
            .await?;

        data.order
            .map(|o| o.fulfillment_orders.nodes)
            .ok_or_else(|| ShopifyError::NotFound(format!("order {order}")))
    }

    /// Put every open fulfillment order of `order` on hold.
    ///
    /// Returns the number of fulfillment orders held.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or returns user errors.
    #[instrument(skip(self), fields(order_id = %order))]
    pub async fn hold_order(&self, order: OrderId, reason: &str) -> Result<usize, ShopifyError> {
        let open: Vec<_> = self
            .fulfillment_orders(order)
            .await?
            .into_iter()
            .filter(|fo| matches!(fo.status.as_str(), "OPEN" | "SCHEDULED"))
            .collect();

        for fo in &open {
            let response = self
                .execute::<FulfillmentOrderHold>(fulfillment_order_hold::Variables {
                    id: fo.id.clone(),
                    fulfillment_hold: fulfillment_order_hold::FulfillmentOrderHoldInput {
                        reason: "OTHER",
                        reason_notes: Some(reason.to_string()),
                        notify_merchant: false,
                    },
                })
                .await?;
            if let Some(payload) = response.fulfillment_order_hold {
                check_user_errors(&payload.user_errors)?;
            }
        }

        Ok(open.len())
    }

    /// Release every held fulfillment order of `order`.
    ///
    /// Returns the number of fulfillment orders released.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or returns user errors.
    #[instrument(skip(self), fields(order_id = %order))]
    pub async fn release_order_hold(&self, order: OrderId) -> Result<usize, ShopifyError> {
        let held: Vec<_> = self
            .fulfillment_orders(order)
            .await?
            .into_iter()
            .filter(|fo| fo.status == "ON_HOLD")
            .collect();

        for fo in &held {
            let response = self
                .execute::<FulfillmentOrderReleaseHold>(fulfillment_order_release_hold::Variables {
                    id: fo.id.clone(),
                })
                .await?;
            if let Some(payload) = response.fulfillment_order_release_hold {
                check_user_errors(&payload.user_errors)?;
            }
        }

        Ok(held.len())
    }

    /// Cancel an order, refunding and restocking it.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or returns user errors.
    #[instrument(skip(self), fields(order_id = %order))]
    pub async fn cancel_order(&self, order: OrderId, staff_note: &str) -> Result<(), ShopifyError> {
        let variables = order_cancel::Variables {
            order_id: order.to_gid(),
            reason: "OTHER",
            refund: true,
            restock: true,
            notify_customer: Some(false),
            staff_note: Some(staff_note.to_string()),
        };

        if let Some(payload) = self.execute::<OrderCancel>(variables).await?.order_cancel {
            check_user_errors(&payload.order_cancel_user_errors)?;
        }

        Ok(())
    }
}
