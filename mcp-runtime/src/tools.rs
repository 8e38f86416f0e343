//! Tool catalog: names, input schemas, and request shaping for every backend endpoint.

use serde_json::{Map, Value, json};

use crate::args::{
    arg_environment, arg_optional_object, arg_optional_string, arg_optional_url,
    arg_positive_f64, arg_string, arg_u64_in_range, required_email, required_header_value,
    required_min_length, required_object, required_object_array, required_path_segment,
    required_positive_f64, required_string,
};
use crate::bridge::{JsonOrText, RequestSpec};
use crate::error::ToolError;
use crate::registry::Tier;

pub const PAYMENT_HEADER: &str = "X-PAYMENT";
pub const CALLBACK_SECRET_HEADER: &str = "X-Callback-Secret";
const WALLET_ADDRESS_LEN: usize = 42;
const DEFAULT_X402_VERSION: u64 = 1;

/// Validates arguments and shapes the outbound request. Never touches the network.
pub type ShapeFn = fn(&Map<String, Value>) -> Result<RequestSpec, ToolError>;

#[derive(Clone)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
    pub shape: ShapeFn,
}

impl std::fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl ToolDescriptor {
    fn new(name: &'static str, description: &'static str, input_schema: Value, shape: ShapeFn) -> Self {
        Self {
            name,
            description,
            input_schema,
            shape,
        }
    }

    /// Validate every argument, then build the request. A validation error
    /// means no request exists.
    pub fn build_request(&self, args: &Map<String, Value>) -> Result<RequestSpec, ToolError> {
        let environment = arg_environment(args)?;
        Ok((self.shape)(args)?.with_environment(environment))
    }

    pub fn to_value(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema,
        })
    }
}

/// Every tool the adapter knows about, with the tier that gates it.
pub fn catalog() -> Vec<(Tier, ToolDescriptor)> {
    vec![
        // Core: diagnostics and status
        (
            Tier::Core,
            ToolDescriptor::new(
                "health_check",
                "Check whether the treasury backend is up.",
                object_schema(json!({}), &[]),
                |_| Ok(RequestSpec::get("/health")),
            ),
        ),
        (
            Tier::Core,
            ToolDescriptor::new(
                "get_system_status",
                "Get backend system status, including service versions and dependencies.",
                object_schema(json!({}), &[]),
                |_| Ok(RequestSpec::get("/api/status")),
            ),
        ),
        (
            Tier::Core,
            ToolDescriptor::new(
                "get_agent_identity",
                "Get the treasury agent's identity and wallet information.",
                object_schema(json!({}), &[]),
                |_| Ok(RequestSpec::get("/api/agent/identity")),
            ),
        ),
        (
            Tier::Core,
            ToolDescriptor::new(
                "get_agent_stats",
                "Get aggregate statistics for the treasury agent.",
                object_schema(json!({}), &[]),
                |_| Ok(RequestSpec::get("/api/agent/stats")),
            ),
        ),
        (
            Tier::Core,
            ToolDescriptor::new(
                "get_agent_activity",
                "List recent treasury agent activity.",
                object_schema(
                    json!({
                        "limit": { "type": "integer", "minimum": 1, "maximum": 100, "default": 20 }
                    }),
                    &[],
                ),
                shape_agent_activity,
            ),
        ),
        (
            Tier::Core,
            ToolDescriptor::new(
                "get_treasury_balance",
                "Get current treasury balances.",
                object_schema(json!({}), &[]),
                |_| Ok(RequestSpec::get("/api/treasury/balance")),
            ),
        ),
        // Core: payment-gated flows
        (
            Tier::Core,
            ToolDescriptor::new(
                "execute_payroll",
                "Execute a payroll run. Requires an X-PAYMENT credential.",
                object_schema(
                    json!({
                        "xPayment": x_payment_schema(),
                        "recipients": {
                            "type": "array",
                            "minItems": 1,
                            "items": {
                                "type": "object",
                                "properties": {
                                    "walletAddress": { "type": "string", "minLength": 42, "maxLength": 42, "pattern": "^0x" },
                                    "amount": { "type": "number", "exclusiveMinimum": 0 },
                                    "name": { "type": "string" }
                                },
                                "required": ["walletAddress", "amount"]
                            }
                        },
                        "currency": { "type": "string", "default": "USDC" },
                        "memo": { "type": "string" }
                    }),
                    &["xPayment", "recipients"],
                ),
                shape_execute_payroll,
            ),
        ),
        (
            Tier::Core,
            ToolDescriptor::new(
                "get_payroll",
                "Fetch a payroll run by id.",
                object_schema(
                    json!({
                        "payrollId": { "type": "string", "minLength": 1 }
                    }),
                    &["payrollId"],
                ),
                shape_get_payroll,
            ),
        ),
        (
            Tier::Core,
            ToolDescriptor::new(
                "process_payment",
                "Process a customer payment. Requires an X-PAYMENT credential. Amount is in major units (e.g. 19.99).",
                object_schema(
                    json!({
                        "xPayment": x_payment_schema(),
                        "customerName": { "type": "string" },
                        "customerEmail": { "type": "string", "format": "email" },
                        "customerPhone": { "type": "string" },
                        "street": { "type": "string" },
                        "city": { "type": "string" },
                        "state": { "type": "string" },
                        "postalCode": { "type": "string" },
                        "country": { "type": "string" },
                        "amount": { "type": "number", "exclusiveMinimum": 0 },
                        "currency": { "type": "string", "default": "USD" },
                        "description": { "type": "string" }
                    }),
                    &["xPayment", "customerName", "customerEmail", "amount"],
                ),
                shape_process_payment,
            ),
        ),
        (
            Tier::Core,
            ToolDescriptor::new(
                "test_treasury",
                "Send a small test transaction through the treasury. Requires an X-PAYMENT credential.",
                object_schema(
                    json!({
                        "xPayment": x_payment_schema(),
                        "amount": { "type": "number", "exclusiveMinimum": 0, "default": 0.01 },
                        "currency": { "type": "string", "default": "USDC" }
                    }),
                    &["xPayment"],
                ),
                shape_test_treasury,
            ),
        ),
        (
            Tier::Core,
            ToolDescriptor::new(
                "send_agent_message",
                "Send an agent-to-agent message. Requires an X-PAYMENT credential. 'payload' is a JSON string; non-JSON text is sent as-is.",
                object_schema(
                    json!({
                        "xPayment": x_payment_schema(),
                        "fromAgent": { "type": "string" },
                        "toAgent": { "type": "string" },
                        "messageType": { "type": "string", "default": "request" },
                        "payload": { "type": "string", "description": "Message payload as a JSON string" },
                        "callbackUrl": { "type": "string", "format": "uri" }
                    }),
                    &["xPayment", "fromAgent", "toAgent", "payload"],
                ),
                shape_agent_message,
            ),
        ),
        // Advanced: facilitator primitives
        (
            Tier::Advanced,
            ToolDescriptor::new(
                "facilitator_health",
                "Check the payment facilitator's health.",
                object_schema(json!({}), &[]),
                |_| Ok(RequestSpec::get("/facilitator/health")),
            ),
        ),
        (
            Tier::Advanced,
            ToolDescriptor::new(
                "facilitator_validate",
                "Validate a payment payload against payment requirements.",
                facilitator_schema(false),
                |args| shape_facilitator(args, "/facilitator/validate", false),
            ),
        ),
        (
            Tier::Advanced,
            ToolDescriptor::new(
                "facilitator_verify",
                "Verify a payment payload's signature and requirements.",
                facilitator_schema(true),
                |args| shape_facilitator(args, "/facilitator/verify", true),
            ),
        ),
        (
            Tier::Advanced,
            ToolDescriptor::new(
                "facilitator_settle",
                "Settle a verified payment on-chain.",
                facilitator_schema(true),
                |args| shape_facilitator(args, "/facilitator/settle", true),
            ),
        ),
        // Internal: auth and privileged callbacks
        (
            Tier::Internal,
            ToolDescriptor::new(
                "internal_payment_callback",
                "Deliver a payment event to the internal callback endpoint.",
                object_schema(
                    json!({
                        "callbackSecret": { "type": "string", "description": "Shared secret sent as X-Callback-Secret" },
                        "event": { "type": "string" },
                        "paymentId": { "type": "string" },
                        "data": { "type": "object" }
                    }),
                    &["callbackSecret", "event"],
                ),
                shape_internal_callback,
            ),
        ),
        (
            Tier::Internal,
            ToolDescriptor::new(
                "auth_signup",
                "Create a dashboard account.",
                object_schema(
                    json!({
                        "email": { "type": "string", "format": "email" },
                        "password": { "type": "string", "minLength": 8 },
                        "name": { "type": "string" }
                    }),
                    &["email", "password"],
                ),
                shape_auth_signup,
            ),
        ),
        (
            Tier::Internal,
            ToolDescriptor::new(
                "auth_login",
                "Log in and obtain a session token.",
                object_schema(
                    json!({
                        "email": { "type": "string", "format": "email" },
                        "password": { "type": "string" }
                    }),
                    &["email", "password"],
                ),
                shape_auth_login,
            ),
        ),
        (
            Tier::Internal,
            ToolDescriptor::new(
                "auth_profile",
                "Get the profile for a session token.",
                bearer_schema(),
                |args| bearer_get(args, "/api/auth/profile"),
            ),
        ),
        (
            Tier::Internal,
            ToolDescriptor::new(
                "get_dashboard",
                "Get dashboard data for a session token.",
                bearer_schema(),
                |args| bearer_get(args, "/api/dashboard"),
            ),
        ),
    ]
}

fn object_schema(properties: Value, required: &[&str]) -> Value {
    let mut properties = properties.as_object().cloned().unwrap_or_default();
    properties.insert(
        "environment".to_string(),
        json!({
            "type": "string",
            "enum": ["development", "staging", "production"],
            "description": "Backend environment for this call (defaults to the server's configured environment)"
        }),
    );
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn x_payment_schema() -> Value {
    json!({ "type": "string", "description": "Payment authorization, forwarded verbatim as the X-PAYMENT header" })
}

fn facilitator_schema(with_version: bool) -> Value {
    let mut properties = json!({
        "paymentPayload": { "type": "object" },
        "paymentRequirements": { "type": "object" }
    });
    if with_version {
        properties["x402Version"] = json!({ "type": "integer", "minimum": 1, "default": DEFAULT_X402_VERSION });
    }
    object_schema(properties, &["paymentPayload", "paymentRequirements"])
}

fn bearer_schema() -> Value {
    object_schema(
        json!({ "bearerToken": { "type": "string", "description": "Session token from auth_login" } }),
        &["bearerToken"],
    )
}

fn shape_agent_activity(args: &Map<String, Value>) -> Result<RequestSpec, ToolError> {
    let limit = arg_u64_in_range(args, "limit", 1, 100, 20)?;
    Ok(RequestSpec::get(format!("/api/agent/activity?limit={limit}")))
}

fn shape_execute_payroll(args: &Map<String, Value>) -> Result<RequestSpec, ToolError> {
    let x_payment = required_header_value(args, "xPayment")?;
    let recipients = required_object_array(args, "recipients")?
        .iter()
        .enumerate()
        .map(|(index, recipient)| payroll_recipient(recipient, index))
        .collect::<Result<Vec<_>, _>>()?;
    let currency = arg_string(args, "currency", "USDC")?;
    let memo = arg_optional_string(args, "memo")?;

    let mut body = json!({
        "recipients": recipients,
        "currency": currency,
    });
    if let Some(memo) = memo {
        body["memo"] = Value::String(memo);
    }
    Ok(RequestSpec::post("/api/payroll/execute", body).with_header(PAYMENT_HEADER, x_payment))
}

fn payroll_recipient(recipient: &Map<String, Value>, index: usize) -> Result<Value, ToolError> {
    let field = |name: &str| format!("recipients[{index}].{name}");
    let relabel = |err: ToolError, name: &str| ToolError {
        field: Some(field(name)),
        message: err.message.replace(&format!("'{name}'"), &format!("'{}'", field(name))),
        ..err
    };

    let wallet = required_string(recipient, "walletAddress").map_err(|e| relabel(e, "walletAddress"))?;
    if wallet.len() != WALLET_ADDRESS_LEN || !wallet.starts_with("0x") {
        return Err(ToolError::validation(
            &field("walletAddress"),
            format!(
                "'{}' must be a {WALLET_ADDRESS_LEN}-character 0x-prefixed address",
                field("walletAddress")
            ),
        ));
    }
    let amount = required_positive_f64(recipient, "amount").map_err(|e| relabel(e, "amount"))?;
    let name = arg_optional_string(recipient, "name").map_err(|e| relabel(e, "name"))?;

    let mut out = json!({ "walletAddress": wallet, "amount": amount });
    if let Some(name) = name {
        out["name"] = Value::String(name);
    }
    Ok(out)
}

fn shape_get_payroll(args: &Map<String, Value>) -> Result<RequestSpec, ToolError> {
    let payroll_id = required_path_segment(args, "payrollId")?;
    Ok(RequestSpec::get(format!("/api/payroll/{payroll_id}")))
}

/// Decimal major-unit amount to integer minor units.
pub fn to_minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

fn shape_process_payment(args: &Map<String, Value>) -> Result<RequestSpec, ToolError> {
    let x_payment = required_header_value(args, "xPayment")?;
    let name = required_string(args, "customerName")?;
    let email = required_email(args, "customerEmail")?;
    let phone = arg_optional_string(args, "customerPhone")?;
    let amount = required_positive_f64(args, "amount")?;
    let currency = arg_string(args, "currency", "USD")?;
    let description = arg_optional_string(args, "description")?;

    let mut address = Map::new();
    for (source, target) in [
        ("street", "line1"),
        ("city", "city"),
        ("state", "state"),
        ("postalCode", "postalCode"),
        ("country", "country"),
    ] {
        if let Some(value) = arg_optional_string(args, source)? {
            address.insert(target.to_string(), Value::String(value));
        }
    }

    let mut customer = Map::new();
    customer.insert("name".to_string(), Value::String(name));
    customer.insert("email".to_string(), Value::String(email));
    if let Some(phone) = phone {
        customer.insert("phone".to_string(), Value::String(phone));
    }

    let mut payment = Map::new();
    payment.insert("amount".to_string(), json!(to_minor_units(amount)));
    payment.insert("currency".to_string(), Value::String(currency));
    if let Some(description) = description {
        payment.insert("description".to_string(), Value::String(description));
    }

    let mut body = Map::new();
    body.insert("customer".to_string(), Value::Object(customer));
    if !address.is_empty() {
        body.insert("address".to_string(), Value::Object(address));
    }
    body.insert("payment".to_string(), Value::Object(payment));

    Ok(
        RequestSpec::post("/api/payments/process", Value::Object(body))
            .with_header(PAYMENT_HEADER, x_payment),
    )
}

fn shape_test_treasury(args: &Map<String, Value>) -> Result<RequestSpec, ToolError> {
    let x_payment = required_header_value(args, "xPayment")?;
    let amount = arg_positive_f64(args, "amount", 0.01)?;
    let currency = arg_string(args, "currency", "USDC")?;
    Ok(RequestSpec::post(
        "/api/treasury/test",
        json!({ "amount": amount, "currency": currency }),
    )
    .with_header(PAYMENT_HEADER, x_payment))
}

fn shape_agent_message(args: &Map<String, Value>) -> Result<RequestSpec, ToolError> {
    let x_payment = required_header_value(args, "xPayment")?;
    let from = required_string(args, "fromAgent")?;
    let to = required_string(args, "toAgent")?;
    let message_type = arg_string(args, "messageType", "request")?;
    let payload = JsonOrText::parse(&required_string(args, "payload")?);
    let callback_url = arg_optional_url(args, "callbackUrl")?;

    let mut body = json!({
        "from": from,
        "to": to,
        "type": message_type,
        "payload": payload,
    });
    if let Some(callback_url) = callback_url {
        body["callbackUrl"] = Value::String(callback_url);
    }
    Ok(RequestSpec::post("/api/a2a/process", body).with_header(PAYMENT_HEADER, x_payment))
}

fn shape_facilitator(
    args: &Map<String, Value>,
    path: &str,
    with_version: bool,
) -> Result<RequestSpec, ToolError> {
    let payment_payload = required_object(args, "paymentPayload")?;
    let payment_requirements = required_object(args, "paymentRequirements")?;

    let mut body = json!({
        "paymentPayload": payment_payload,
        "paymentRequirements": payment_requirements,
    });
    if with_version {
        let version = arg_u64_in_range(args, "x402Version", 1, u64::MAX, DEFAULT_X402_VERSION)?;
        body["x402Version"] = json!(version);
    }
    Ok(RequestSpec::post(path, body))
}

fn shape_internal_callback(args: &Map<String, Value>) -> Result<RequestSpec, ToolError> {
    let secret = required_header_value(args, "callbackSecret")?;
    let event = required_string(args, "event")?;
    let payment_id = arg_optional_string(args, "paymentId")?;
    let data = arg_optional_object(args, "data")?;

    let mut body = json!({ "event": event });
    if let Some(payment_id) = payment_id {
        body["paymentId"] = Value::String(payment_id);
    }
    if let Some(data) = data {
        body["data"] = Value::Object(data);
    }
    Ok(RequestSpec::post("/api/internal/callback", body).with_header(CALLBACK_SECRET_HEADER, secret))
}

fn shape_auth_signup(args: &Map<String, Value>) -> Result<RequestSpec, ToolError> {
    let email = required_email(args, "email")?;
    let password = required_min_length(args, "password", 8)?;
    let name = arg_optional_string(args, "name")?;

    let mut body = json!({ "email": email, "password": password });
    if let Some(name) = name {
        body["name"] = Value::String(name);
    }
    Ok(RequestSpec::post("/api/auth/signup", body))
}

fn shape_auth_login(args: &Map<String, Value>) -> Result<RequestSpec, ToolError> {
    let email = required_email(args, "email")?;
    let password = required_string(args, "password")?;
    Ok(RequestSpec::post(
        "/api/auth/login",
        json!({ "email": email, "password": password }),
    ))
}

fn bearer_get(args: &Map<String, Value>, path: &str) -> Result<RequestSpec, ToolError> {
    let token = required_header_value(args, "bearerToken")?;
    Ok(RequestSpec::get(path).with_header("Authorization", format!("Bearer {token}")))
}
