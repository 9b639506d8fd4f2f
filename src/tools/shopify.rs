//! Shopify store tools over the Admin REST API.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveTime, Utc};
use serde_json::{json, Map, Value};

use crate::config::ShopifySettings;
use crate::protocol::{
    Arguments, ParameterSpec, ParameterType, ToolContent, ToolDescriptor, ToolError, ToolResult,
};
use crate::registry::{ToolKind, ToolSet};

use super::args::{opt_str, opt_u64, req_str};
use super::format::{money, number, text_field};
use super::upstream::Upstream;

const DEFAULT_RECENT_ORDERS: u64 = 5;
const MAX_RECENT_ORDERS: u64 = 50;
const DEFAULT_STOCK_THRESHOLD: u64 = 5;
/// Largest page the Admin API serves.
const PAGE_LIMIT: &str = "250";

/// Tools of the `shopify` server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShopifyTool {
    /// Sales created today.
    TotalSalesToday,
    /// Sales over a preset period.
    SalesByPeriod,
    /// Most recent orders.
    RecentOrders,
    /// One order by id or name.
    OrderDetails,
    /// Variants at or below a stock threshold.
    LowStockProducts,
}

impl ToolKind for ShopifyTool {
    const ALL: &'static [Self] = &[
        ShopifyTool::TotalSalesToday,
        ShopifyTool::SalesByPeriod,
        ShopifyTool::RecentOrders,
        ShopifyTool::OrderDetails,
        ShopifyTool::LowStockProducts,
    ];

    fn name(self) -> &'static str {
        match self {
            ShopifyTool::TotalSalesToday => "get_total_sales_today",
            ShopifyTool::SalesByPeriod => "get_sales_by_period",
            ShopifyTool::RecentOrders => "get_recent_orders",
            ShopifyTool::OrderDetails => "get_order_details",
            ShopifyTool::LowStockProducts => "get_low_stock_products",
        }
    }

    fn descriptor(self) -> ToolDescriptor {
        let descriptor = |description: &str| ToolDescriptor::new(self.name(), description);
        match self {
            ShopifyTool::TotalSalesToday => {
                descriptor("Ventas de HOY en Shopify: total vendido, número de pedidos y ticket promedio.")
            }
            ShopifyTool::SalesByPeriod => descriptor("Ventas de Shopify en un periodo.").param(
                "period",
                ParameterSpec::required(ParameterType::String, "Periodo a consultar")
                    .one_of(["today", "yesterday", "last_7d", "last_30d", "week", "month"]),
            ),
            ShopifyTool::RecentOrders => descriptor("Últimos pedidos de la tienda.").param(
                "limit",
                ParameterSpec::optional(ParameterType::Integer, "Cantidad de pedidos (default 5, máximo 50)"),
            ),
            ShopifyTool::OrderDetails => descriptor("Detalle de un pedido por ID o número (ej: #1001).").param(
                "order_id",
                ParameterSpec::required(ParameterType::String, "ID o número del pedido"),
            ),
            ShopifyTool::LowStockProducts => {
                descriptor("Productos con inventario bajo.").param(
                    "threshold",
                    ParameterSpec::optional(
                        ParameterType::Integer,
                        "Unidades a partir de las cuales se considera bajo (default 5)",
                    ),
                )
            }
        }
    }
}

/// Creation-time window of an orders query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderWindow {
    /// Inclusive lower bound.
    pub start: DateTime<Utc>,
    /// Exclusive upper bound; open when `None`.
    pub end: Option<DateTime<Utc>>,
}

/// Resolve a period name into an order window relative to `now`.
pub fn period_window(period: &str, now: DateTime<Utc>) -> Option<OrderWindow> {
    let midnight = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    let back = |days: u64| midnight.checked_sub_days(Days::new(days));
    match period {
        "today" => Some(OrderWindow {
            start: midnight,
            end: None,
        }),
        "yesterday" => back(1).map(|start| OrderWindow {
            start,
            end: Some(midnight),
        }),
        "last_7d" | "week" => back(7).map(|start| OrderWindow { start, end: None }),
        "last_30d" | "month" => back(30).map(|start| OrderWindow { start, end: None }),
        _ => None,
    }
}

/// Totals over a list of orders.
#[derive(Debug, Clone, PartialEq)]
pub struct SalesSummary {
    /// Orders counted.
    pub orders: usize,
    /// Cancelled orders left out of the totals.
    pub cancelled: usize,
    /// Sum of `total_price`.
    pub revenue: f64,
    /// Store currency of the first order.
    pub currency: String,
}

impl SalesSummary {
    /// Sum non-cancelled orders.
    pub fn from_orders(orders: &[Value]) -> Self {
        let mut summary = SalesSummary {
            orders: 0,
            cancelled: 0,
            revenue: 0.0,
            currency: String::new(),
        };
        for order in orders {
            if order.get("cancelled_at").is_some_and(|c| !c.is_null()) {
                summary.cancelled += 1;
                continue;
            }
            summary.orders += 1;
            summary.revenue += number(order.get("total_price"));
            if summary.currency.is_empty() {
                summary.currency = text_field(order, &["currency"]).unwrap_or_default();
            }
        }
        summary
    }

    /// Average order value.
    pub fn average(&self) -> f64 {
        if self.orders == 0 {
            0.0
        } else {
            self.revenue / self.orders as f64
        }
    }

    fn render(&self, label: &str) -> String {
        let mut report = format!(
            "VENTAS SHOPIFY ({}):\nTotal: ${} {}\nPedidos: {}\nTicket promedio: ${}",
            label,
            money(self.revenue),
            self.currency,
            self.orders,
            money(self.average()),
        );
        if self.cancelled > 0 {
            report.push_str(&format!("\nCancelados (no incluidos): {}", self.cancelled));
        }
        report
    }
}

/// A variant at or below the stock threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LowStock {
    /// Product title, with the variant title when it is not the default.
    pub title: String,
    /// Units available.
    pub quantity: i64,
}

/// Variants with `inventory_quantity` at or below `threshold`, lowest first.
pub fn low_stock(products: &[Value], threshold: i64) -> Vec<LowStock> {
    let mut found: Vec<LowStock> = products
        .iter()
        .flat_map(|product| {
            let product_title = text_field(product, &["title"]).unwrap_or_else(|| "Sin nombre".to_string());
            product
                .get("variants")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .filter_map(move |variant| {
                    let quantity = variant.get("inventory_quantity")?.as_i64()?;
                    if quantity > threshold {
                        return None;
                    }
                    let title = match variant.get("title").and_then(Value::as_str) {
                        Some(v) if v != "Default Title" => format!("{} ({})", product_title, v),
                        _ => product_title.clone(),
                    };
                    Some(LowStock { title, quantity })
                })
        })
        .collect();
    found.sort_by_key(|item| item.quantity);
    found
}

fn order_line(order: &Value) -> String {
    let customer = order
        .get("customer")
        .map(|c| {
            format!(
                "{} {}",
                c.get("first_name").and_then(Value::as_str).unwrap_or(""),
                c.get("last_name").and_then(Value::as_str).unwrap_or("")
            )
            .trim()
            .to_string()
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "Cliente".to_string());

    format!(
        "{} | {} | ${} | {}",
        text_field(order, &["name", "id"]).unwrap_or_default(),
        customer,
        money(number(order.get("total_price"))),
        text_field(order, &["financial_status"]).unwrap_or_else(|| "N/A".to_string()),
    )
}

/// Handlers of the `shopify` server.
pub struct ShopifyTools {
    settings: ShopifySettings,
    upstream: Upstream,
}

impl ShopifyTools {
    /// Create the tool set.
    pub fn new(settings: ShopifySettings, timeout: Duration) -> ToolResult<Self> {
        Ok(Self {
            settings,
            upstream: Upstream::new("Shopify", timeout)?,
        })
    }

    fn base_url(&self) -> ToolResult<String> {
        let domain = self
            .settings
            .shop_domain
            .as_deref()
            .ok_or_else(|| ToolError::not_configured("Shopify", "SHOPIFY_SHOP_DOMAIN is not set"))?;
        let domain = domain.trim_end_matches('/');
        if domain.starts_with("http://") || domain.starts_with("https://") {
            Ok(domain.to_string())
        } else {
            Ok(format!("https://{}", domain))
        }
    }

    async fn admin(&self, resource: &str, query: &[(&str, String)]) -> ToolResult<Value> {
        let token = self
            .settings
            .access_token
            .as_deref()
            .ok_or_else(|| ToolError::not_configured("Shopify", "SHOPIFY_ACCESS_TOKEN is not set"))?;
        let url = format!(
            "{}/admin/api/{}/{}.json",
            self.base_url()?,
            self.settings.api_version,
            resource
        );
        let request = self
            .upstream
            .http()
            .get(url)
            .header("X-Shopify-Access-Token", token)
            .query(query);
        self.upstream.send(request).await
    }

    async fn orders(&self, query: &[(&str, String)]) -> ToolResult<Vec<Value>> {
        let body = self.admin("orders", query).await?;
        Ok(body
            .get("orders")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    async fn sales(&self, period: &str) -> ToolResult<ToolContent> {
        let tool = ShopifyTool::SalesByPeriod.name();
        let window = period_window(period, Utc::now()).ok_or_else(|| {
            ToolError::invalid_argument(tool, format!("unknown period '{}'", period))
        })?;

        let mut query = vec![
            ("status", "any".to_string()),
            ("created_at_min", window.start.to_rfc3339()),
            ("limit", PAGE_LIMIT.to_string()),
            ("fields", "id,name,total_price,currency,cancelled_at".to_string()),
        ];
        if let Some(end) = window.end {
            query.push(("created_at_max", end.to_rfc3339()));
        }

        let orders = self.orders(&query).await?;
        let summary = SalesSummary::from_orders(&orders);
        Ok(ToolContent::Text(summary.render(&period.to_uppercase())))
    }

    async fn recent_orders(&self, arguments: &Arguments) -> ToolResult<ToolContent> {
        let tool = ShopifyTool::RecentOrders.name();
        let limit = opt_u64(arguments, tool, "limit")?
            .unwrap_or(DEFAULT_RECENT_ORDERS)
            .clamp(1, MAX_RECENT_ORDERS);

        let orders = self
            .orders(&[("status", "any".to_string()), ("limit", limit.to_string())])
            .await?;
        if orders.is_empty() {
            return Ok(ToolContent::Text("No hay pedidos recientes.".to_string()));
        }

        let lines: Vec<String> = orders.iter().map(order_line).collect();
        Ok(ToolContent::Text(format!(
            "ÚLTIMOS {} PEDIDOS:\n{}",
            orders.len(),
            lines.join("\n")
        )))
    }

    async fn order_details(&self, arguments: &Arguments) -> ToolResult<ToolContent> {
        let tool = ShopifyTool::OrderDetails.name();
        let order_id = req_str(arguments, tool, "order_id")?;

        // Numeric ids are resource ids; anything else is an order name like "#1001"
        let order = if order_id.chars().all(|c| c.is_ascii_digit()) && order_id.len() > 6 {
            self.admin(&format!("orders/{}", order_id), &[])
                .await?
                .get("order")
                .cloned()
        } else {
            let name = if order_id.starts_with('#') {
                order_id.to_string()
            } else {
                format!("#{}", order_id)
            };
            self.orders(&[("status", "any".to_string()), ("name", name)])
                .await?
                .into_iter()
                .next()
        };

        let Some(order) = order else {
            return Ok(ToolContent::Text(format!("No encontré el pedido {}", order_id)));
        };

        let items: Vec<String> = order
            .get("line_items")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .map(|item| {
                format!(
                    "  - {} x{} (${})",
                    text_field(item, &["title", "name"]).unwrap_or_default(),
                    number(item.get("quantity")) as u64,
                    money(number(item.get("price"))),
                )
            })
            .collect();

        Ok(ToolContent::Text(format!(
            "PEDIDO {}\nFecha: {}\nPago: {}\nEnvío: {}\nTotal: ${} {}\nProductos:\n{}",
            order_line(&order),
            text_field(&order, &["created_at"]).unwrap_or_default(),
            text_field(&order, &["financial_status"]).unwrap_or_else(|| "N/A".to_string()),
            text_field(&order, &["fulfillment_status"]).unwrap_or_else(|| "sin enviar".to_string()),
            money(number(order.get("total_price"))),
            text_field(&order, &["currency"]).unwrap_or_default(),
            items.join("\n"),
        )))
    }

    async fn low_stock_products(&self, arguments: &Arguments) -> ToolResult<ToolContent> {
        let tool = ShopifyTool::LowStockProducts.name();
        let threshold = opt_u64(arguments, tool, "threshold")?.unwrap_or(DEFAULT_STOCK_THRESHOLD);

        let body = self
            .admin(
                "products",
                &[
                    ("limit", PAGE_LIMIT.to_string()),
                    ("fields", "id,title,variants".to_string()),
                ],
            )
            .await?;
        let products = body
            .get("products")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let found = low_stock(&products, i64::try_from(threshold).unwrap_or(i64::MAX));
        if found.is_empty() {
            return Ok(ToolContent::Text(format!(
                "Ningún producto con {} unidades o menos.",
                threshold
            )));
        }

        let lines: Vec<String> = found
            .iter()
            .map(|item| format!("  - {}: {} unidades", item.title, item.quantity))
            .collect();
        Ok(ToolContent::Text(format!(
            "INVENTARIO BAJO (<= {}):\n{}",
            threshold,
            lines.join("\n")
        )))
    }
}

#[async_trait]
impl ToolSet for ShopifyTools {
    type Tool = ShopifyTool;

    fn server_name(&self) -> &str {
        "shopify"
    }

    async fn call(&self, tool: ShopifyTool, arguments: &Arguments) -> ToolResult<ToolContent> {
        match tool {
            ShopifyTool::TotalSalesToday => self.sales("today").await,
            ShopifyTool::SalesByPeriod => {
                let period = opt_str(arguments, "period").unwrap_or("today");
                self.sales(period).await
            }
            ShopifyTool::RecentOrders => self.recent_orders(arguments).await,
            ShopifyTool::OrderDetails => self.order_details(arguments).await,
            ShopifyTool::LowStockProducts => self.low_stock_products(arguments).await,
        }
    }

    fn diagnostics(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("shop_domain".to_string(), json!(self.settings.shop_domain));
        fields.insert("api_version".to_string(), json!(self.settings.api_version));
        fields.insert(
            "access_token_configured".to_string(),
            json!(self.settings.access_token.is_some()),
        );
        fields
    }
}
