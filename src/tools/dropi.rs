//! Dropi dropshipping tools.
//!
//! The Dropi API differs between country platforms and account types, so
//! several handlers try a list of candidate endpoints and use the first
//! one that answers.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Days, Utc};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::config::DropiSettings;
use crate::protocol::{
    Arguments, ParameterSpec, ParameterType, ToolContent, ToolDescriptor, ToolError, ToolResult,
};
use crate::registry::{ToolKind, ToolSet};

use super::args::{opt_str, opt_u64, req_str};
use super::format::{first_field, money, number, rate, text_field};
use super::upstream::Upstream;

const WALLET_ENDPOINTS: &[&str] = &["wallet", "wallet/balance", "user/wallet", "billing/wallet", "balance"];
const ACCOUNT_ENDPOINTS: &[&str] = &["user", "me", "account", "profile", "user/profile"];
const PAYMENT_ENDPOINTS: &[&str] = &["payments", "wallet/payments", "billing/payments", "liquidations"];
const MOVEMENT_TYPES: &[&str] = &["ENTRADA", "SALIDA"];
const LISTED_ROWS: usize = 20;
const DEFAULT_ORDER_LIMIT: u64 = 20;
const MAX_ORDER_LIMIT: u64 = 100;
const DEFAULT_DAYS: u64 = 30;
const STATS_PAGE: &str = "500";

/// An endpoint with its query parameters.
type Candidate = (&'static str, Vec<(&'static str, String)>);

/// Tools of the `dropi` server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropiTool {
    /// Wallet balances.
    Wallet,
    /// Wallet movements: income, charges and net.
    WalletHistory,
    /// Recent orders with a per-status summary.
    Orders,
    /// Delivery and return statistics.
    OrderStats,
    /// Settlements paid out by Dropi.
    Payments,
    /// Returned orders with return charges.
    Returns,
    /// Delivered revenue against return charges.
    ProfitAnalysis,
    /// Account profile.
    AccountInfo,
    /// Find an order by id, tracking number or customer.
    SearchOrder,
}

impl ToolKind for DropiTool {
    const ALL: &'static [Self] = &[
        DropiTool::Wallet,
        DropiTool::WalletHistory,
        DropiTool::Orders,
        DropiTool::OrderStats,
        DropiTool::Payments,
        DropiTool::Returns,
        DropiTool::ProfitAnalysis,
        DropiTool::AccountInfo,
        DropiTool::SearchOrder,
    ];

    fn name(self) -> &'static str {
        match self {
            DropiTool::Wallet => "get_dropi_wallet",
            DropiTool::WalletHistory => "get_dropi_wallet_history",
            DropiTool::Orders => "get_dropi_orders",
            DropiTool::OrderStats => "get_dropi_order_stats",
            DropiTool::Payments => "get_dropi_payments",
            DropiTool::Returns => "get_dropi_returns",
            DropiTool::ProfitAnalysis => "get_dropi_profit_analysis",
            DropiTool::AccountInfo => "get_dropi_account_info",
            DropiTool::SearchOrder => "search_dropi_order",
        }
    }

    fn descriptor(self) -> ToolDescriptor {
        let descriptor = |description: &str| ToolDescriptor::new(self.name(), description);
        let days = || ParameterSpec::optional(ParameterType::Integer, "Últimos X días (default 30)");
        match self {
            DropiTool::Wallet => descriptor(
                "Saldo de la billetera de Dropi: disponible, pendiente por liquidar y total.",
            ),
            DropiTool::Orders => descriptor("Lista las órdenes de Dropi con estado, cliente y valor.")
                .param(
                    "status",
                    ParameterSpec::optional(
                        ParameterType::String,
                        "Filtrar por estado (pendiente, entregado, devuelto...); 'all' para todos",
                    ),
                )
                .param(
                    "limit",
                    ParameterSpec::optional(ParameterType::Integer, "Cantidad de órdenes (default 20, máximo 100)"),
                )
                .param("days", days()),
            DropiTool::OrderStats => descriptor(
                "Estadísticas de órdenes: entregadas, pendientes, devueltas, tasa de entrega y de devolución.",
            )
            .param("days", days()),
            DropiTool::WalletHistory => descriptor(
                "Historial de movimientos de la cartera de Dropi: entradas (pagos recibidos), \
                 salidas (cobros, fletes, devoluciones) y neto del periodo.",
            )
            .param("days", days())
            .param(
                "type",
                ParameterSpec::optional(ParameterType::String, "Solo ENTRADA o solo SALIDA")
                    .one_of(MOVEMENT_TYPES.iter().copied()),
            ),
            DropiTool::Payments => descriptor("Pagos recibidos de Dropi (liquidaciones) y total recibido.")
                .param("days", days()),
            DropiTool::Returns => descriptor(
                "Devoluciones: órdenes devueltas con motivo, valor perdido y cobros por devolución.",
            )
            .param("days", days()),
            DropiTool::ProfitAnalysis => descriptor(
                "Análisis de rentabilidad en Dropi: ingresos por entregas, cobros por devoluciones, \
                 saldo en cartera y proyección de los pedidos pendientes.",
            )
            .param("days", days()),
            DropiTool::AccountInfo => descriptor("Información de la cuenta de Dropi."),
            DropiTool::SearchOrder => descriptor("Busca una orden por ID, número de guía o nombre del cliente.")
                .param(
                    "query",
                    ParameterSpec::required(ParameterType::String, "ID, guía o nombre a buscar"),
                ),
        }
    }
}

/// Wallet balances found in a Dropi reply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wallet {
    /// Total balance.
    pub balance: f64,
    /// Amount not yet settled.
    pub pending: f64,
    /// Amount available for withdrawal.
    pub available: f64,
}

/// Extract wallet balances from the known reply shapes.
///
/// Returns `None` when no balance field is present.
pub fn extract_wallet(body: &Value) -> Option<Wallet> {
    let data = body.get("data").unwrap_or(&Value::Null);
    let balance = first_field(body, &["balance", "saldo", "available"])
        .or_else(|| first_field(data, &["balance"]))?;
    let balance = number(Some(balance));
    let pending = number(first_field(body, &["pending", "pendiente"]).or_else(|| first_field(data, &["pending"])));
    let available = first_field(body, &["available", "disponible"])
        .map(|v| number(Some(v)))
        .unwrap_or(balance);
    Some(Wallet {
        balance,
        pending,
        available,
    })
}

/// The order list of a Dropi reply, under `data`, `orders` or `items`.
pub fn order_list(body: &Value) -> Option<&Vec<Value>> {
    ["data", "orders", "items"]
        .iter()
        .filter_map(|key| body.get(*key))
        .find_map(Value::as_array)
}

/// Normalized order state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OrderState {
    /// Awaiting dispatch.
    Pending,
    /// Shipped or in transit.
    InProcess,
    /// Delivered to the customer.
    Delivered,
    /// Returned to the seller.
    Returned,
    /// Cancelled before shipping.
    Cancelled,
}

impl OrderState {
    /// Map a raw Dropi status; unknown statuses count as pending.
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "entregado" | "delivered" => OrderState::Delivered,
            "en_proceso" | "in_process" | "shipped" => OrderState::InProcess,
            "devuelto" | "returned" => OrderState::Returned,
            "cancelado" | "cancelled" => OrderState::Cancelled,
            _ => OrderState::Pending,
        }
    }
}

/// Order fields normalized across reply shapes.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSummary {
    /// Order id or tracking number.
    pub id: String,
    /// Raw status text.
    pub status: String,
    /// Customer name.
    pub customer: String,
    /// Order value.
    pub amount: f64,
    /// Creation date (`YYYY-MM-DD`), when reported.
    pub date: Option<String>,
}

impl OrderSummary {
    /// Normalize one order object.
    pub fn from_value(order: &Value) -> Self {
        let customer = text_field(order, &["customer_name", "cliente"])
            .or_else(|| order.get("client").and_then(|c| text_field(c, &["name"])))
            .unwrap_or_else(|| "Sin nombre".to_string());
        Self {
            id: text_field(order, &["id", "order_id", "tracking_number"]).unwrap_or_else(|| "N/A".to_string()),
            status: text_field(order, &["status", "estado"]).unwrap_or_else(|| "Desconocido".to_string()),
            customer,
            amount: number(first_field(order, &["total", "amount", "valor"])),
            date: text_field(order, &["created_at", "fecha"]).map(|d| d.chars().take(10).collect()),
        }
    }

    fn render(&self) -> String {
        let mut line = format!(
            "#{} | {}\n  ${} | {}",
            self.id,
            self.customer,
            money(self.amount),
            self.status
        );
        if let Some(date) = &self.date {
            line.push_str(&format!("\n  {}", date));
        }
        line
    }
}

/// Delivery statistics over a set of orders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderStats {
    /// Orders counted.
    pub total: usize,
    /// Orders per normalized state.
    pub by_state: BTreeMap<OrderState, usize>,
    /// Sum of all order values.
    pub total_value: f64,
    /// Value of delivered orders.
    pub delivered_value: f64,
    /// Value of returned orders.
    pub returned_value: f64,
    /// Value of orders not yet delivered, returned or cancelled.
    pub pending_value: f64,
    /// Return charges billed on returned orders.
    pub return_charges: f64,
}

impl OrderStats {
    /// Aggregate raw orders.
    pub fn from_orders(orders: &[Value]) -> Self {
        let mut stats = OrderStats::default();
        for order in orders {
            let summary = OrderSummary::from_value(order);
            let state = OrderState::from_raw(&summary.status);
            stats.total += 1;
            stats.total_value += summary.amount;
            *stats.by_state.entry(state).or_default() += 1;
            match state {
                OrderState::Delivered => stats.delivered_value += summary.amount,
                OrderState::Returned => {
                    stats.returned_value += summary.amount;
                    stats.return_charges += return_charge(order);
                }
                OrderState::Pending | OrderState::InProcess => stats.pending_value += summary.amount,
                OrderState::Cancelled => {}
            }
        }
        stats
    }

    /// Orders in `state`.
    pub fn count(&self, state: OrderState) -> usize {
        self.by_state.get(&state).copied().unwrap_or(0)
    }

    /// Percentage of delivered orders.
    pub fn delivery_rate(&self) -> f64 {
        rate(self.count(OrderState::Delivered), self.total)
    }

    /// Percentage of returned orders.
    pub fn return_rate(&self) -> f64 {
        rate(self.count(OrderState::Returned), self.total)
    }

    fn render(&self, days: u64) -> String {
        format!(
            "ESTADÍSTICAS DE ÓRDENES DROPI (últimos {} días):\n\nTotal órdenes: {}\n\n\
             Entregadas: {} ({:.1}%)\nPendientes: {}\nEn proceso: {}\nDevueltas: {} ({:.1}%)\nCanceladas: {}\n\n\
             VALORES:\n  Valor total: ${}\n  Entregado: ${}\n  Devuelto: ${}\n\n\
             Tasa de entrega: {:.1}%\nTasa de devolución: {:.1}%",
            days,
            self.total,
            self.count(OrderState::Delivered),
            self.delivery_rate(),
            self.count(OrderState::Pending),
            self.count(OrderState::InProcess),
            self.count(OrderState::Returned),
            self.return_rate(),
            self.count(OrderState::Cancelled),
            money(self.total_value),
            money(self.delivered_value),
            money(self.returned_value),
            self.delivery_rate(),
            self.return_rate(),
        )
    }
}

fn return_charge(order: &Value) -> f64 {
    number(first_field(order, &["return_charge", "cobro_devolucion"]))
}

/// Whether a `YYYY-MM-DD...` date falls on or after `since`.
///
/// Undated rows are kept.
pub fn on_or_after(date: Option<&str>, since: &str) -> bool {
    match date {
        Some(date) if date.len() >= 10 => &date[..10] >= since,
        _ => true,
    }
}

/// Direction of a wallet movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementKind {
    /// Money credited to the wallet.
    Income,
    /// Money debited from the wallet.
    Expense,
}

/// One wallet movement.
#[derive(Debug, Clone, PartialEq)]
pub struct WalletMovement {
    /// Credit or debit.
    pub kind: MovementKind,
    /// Amount moved.
    pub amount: f64,
    /// Order the movement belongs to, when any.
    pub order_id: Option<String>,
    /// Movement date (`YYYY-MM-DD`).
    pub date: Option<String>,
}

impl WalletMovement {
    /// Normalize one movement; anything not marked `ENTRADA` is a debit.
    pub fn from_value(movement: &Value) -> Self {
        let kind = match text_field(movement, &["type", "tipo"]) {
            Some(kind) if kind.eq_ignore_ascii_case("entrada") || kind.eq_ignore_ascii_case("income") => {
                MovementKind::Income
            }
            _ => MovementKind::Expense,
        };
        Self {
            kind,
            amount: number(first_field(movement, &["amount", "monto"])).abs(),
            order_id: text_field(movement, &["order_id"]),
            date: text_field(movement, &["created_at", "fecha"]).map(|d| d.chars().take(10).collect()),
        }
    }
}

/// The movement list of a wallet history reply.
pub fn movement_list(body: &Value) -> Option<&Vec<Value>> {
    let data = body.get("data").unwrap_or(&Value::Null);
    [data.get("objects"), Some(data), body.get("objects"), body.get("movements")]
        .into_iter()
        .flatten()
        .find_map(Value::as_array)
}

/// Income and charges over a set of wallet movements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WalletHistory {
    /// Movements, newest first as reported.
    pub movements: Vec<WalletMovement>,
    /// Sum of credits.
    pub income: f64,
    /// Sum of debits.
    pub expenses: f64,
}

impl WalletHistory {
    /// Aggregate movements.
    pub fn from_movements<I: IntoIterator<Item = WalletMovement>>(movements: I) -> Self {
        let mut history = WalletHistory::default();
        for movement in movements {
            match movement.kind {
                MovementKind::Income => history.income += movement.amount,
                MovementKind::Expense => history.expenses += movement.amount,
            }
            history.movements.push(movement);
        }
        history
    }

    /// Credits minus debits.
    pub fn net(&self) -> f64 {
        self.income - self.expenses
    }

    fn count(&self, kind: MovementKind) -> usize {
        self.movements.iter().filter(|m| m.kind == kind).count()
    }

    fn render(&self, days: u64) -> String {
        let mut report = format!(
            "HISTORIAL DE CARTERA DROPI (últimos {} días)\nMovimientos: {}\n\n",
            days,
            self.movements.len()
        );
        for movement in self.movements.iter().take(LISTED_ROWS) {
            let (sign, label) = match movement.kind {
                MovementKind::Income => ("+", "ENTRADA"),
                MovementKind::Expense => ("-", "SALIDA"),
            };
            report.push_str(&format!("{} ${} | {}", sign, money(movement.amount), label));
            if let Some(order_id) = &movement.order_id {
                report.push_str(&format!(" | Orden #{}", order_id));
            }
            report.push_str(&format!(" | {}\n", movement.date.as_deref().unwrap_or("N/A")));
        }
        if self.movements.len() > LISTED_ROWS {
            report.push_str(&format!("... y {} más\n", self.movements.len() - LISTED_ROWS));
        }
        report.push_str(&format!(
            "\nRESUMEN:\n  Entradas: ${} ({})\n  Salidas: ${} ({})\n  Neto: ${}",
            money(self.income),
            self.count(MovementKind::Income),
            money(self.expenses),
            self.count(MovementKind::Expense),
            money(self.net()),
        ));
        report
    }
}

/// One settlement paid out by Dropi.
#[derive(Debug, Clone, PartialEq)]
pub struct Payment {
    /// Amount paid.
    pub amount: f64,
    /// Payment date (`YYYY-MM-DD`).
    pub date: Option<String>,
    /// Reported status.
    pub status: String,
}

impl Payment {
    /// Normalize one payment object.
    pub fn from_value(payment: &Value) -> Self {
        Self {
            amount: number(first_field(payment, &["amount", "monto"])),
            date: text_field(payment, &["date", "fecha", "created_at"]).map(|d| d.chars().take(10).collect()),
            status: text_field(payment, &["status", "estado"]).unwrap_or_else(|| "Procesado".to_string()),
        }
    }
}

/// The payment list of a Dropi reply.
pub fn payment_list(body: &Value) -> Option<&Vec<Value>> {
    ["data", "payments", "items"]
        .iter()
        .filter_map(|key| body.get(*key))
        .find_map(Value::as_array)
}

/// A returned order.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnedOrder {
    /// Order id.
    pub id: String,
    /// Return reason.
    pub reason: String,
    /// Order value.
    pub amount: f64,
    /// Return charge billed by Dropi.
    pub charge: f64,
}

/// Returned orders with their totals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReturnSummary {
    /// Returned orders.
    pub orders: Vec<ReturnedOrder>,
    /// Sum of returned order values.
    pub total_value: f64,
    /// Sum of return charges.
    pub total_charges: f64,
}

impl ReturnSummary {
    /// Keep the returned orders of a reply; rows without a status count as returns.
    pub fn from_orders(orders: &[Value]) -> Self {
        let mut summary = ReturnSummary::default();
        for order in orders {
            let returned = text_field(order, &["status", "estado"])
                .map_or(true, |status| OrderState::from_raw(&status) == OrderState::Returned);
            if !returned {
                continue;
            }
            let returned = ReturnedOrder {
                id: text_field(order, &["id", "order_id"]).unwrap_or_else(|| "N/A".to_string()),
                reason: text_field(order, &["return_reason", "motivo", "reason"])
                    .unwrap_or_else(|| "Sin especificar".to_string()),
                amount: number(first_field(order, &["total", "amount", "valor"])),
                charge: return_charge(order),
            };
            summary.total_value += returned.amount;
            summary.total_charges += returned.charge;
            summary.orders.push(returned);
        }
        summary
    }

    fn render(&self) -> String {
        let mut report = "DEVOLUCIONES DROPI:\n".to_string();
        for order in self.orders.iter().take(LISTED_ROWS) {
            report.push_str(&format!(
                "\n#{}\n  Valor: ${}\n  Motivo: {}\n",
                order.id,
                money(order.amount),
                order.reason
            ));
            if order.charge > 0.0 {
                report.push_str(&format!("  Cobro por devolución: ${}\n", money(order.charge)));
            }
        }
        report.push_str(&format!(
            "\nRESUMEN DEVOLUCIONES:\n  Total devoluciones: {}\n  Valor perdido: ${}\n  Cobros por devolución: ${}",
            self.orders.len(),
            money(self.total_value),
            money(self.total_charges),
        ));
        report
    }
}

/// The returned-order list of a Dropi reply.
fn return_list(body: &Value) -> Option<&Vec<Value>> {
    ["data", "orders", "returns", "items"]
        .iter()
        .filter_map(|key| body.get(*key))
        .find_map(Value::as_array)
}

/// Dropi side of the profit question.
///
/// Product and ad costs live elsewhere; this only covers what Dropi knows.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfitAnalysis {
    /// Order statistics of the period.
    pub stats: OrderStats,
    /// Wallet balance, when a wallet endpoint answered.
    pub wallet_balance: Option<f64>,
}

impl ProfitAnalysis {
    /// Revenue from delivered orders.
    pub fn revenue(&self) -> f64 {
        self.stats.delivered_value
    }

    /// Revenue minus return charges.
    pub fn net(&self) -> f64 {
        self.revenue() - self.stats.return_charges
    }

    /// Pending value discounted by the current return rate.
    pub fn projected_pending(&self) -> f64 {
        self.stats.pending_value * (1.0 - self.stats.return_rate() / 100.0)
    }

    fn render(&self, days: u64) -> String {
        let stats = &self.stats;
        let pending = stats.count(OrderState::Pending) + stats.count(OrderState::InProcess);
        let wallet = self
            .wallet_balance
            .map(|balance| format!("${}", money(balance)))
            .unwrap_or_else(|| "no disponible".to_string());
        format!(
            "ANÁLISIS DE RENTABILIDAD DROPI (últimos {} días):\n\n\
             ÓRDENES:\n  Total: {}\n  Entregadas: {} (${})\n  Pendientes: {} (${})\n  \
             Devueltas: {} (${})\n  Canceladas: {}\n\n\
             TASAS:\n  Tasa de entrega: {:.1}%\n  Tasa de devolución: {:.1}%\n\n\
             FINANCIERO:\n  Ingresos por entregas: ${}\n  Cobros por devoluciones: ${}\n  \
             Neto Dropi: ${}\n  Saldo en cartera: {}\n\n\
             PROYECCIÓN:\n  Valor de los {} pedidos pendientes: ${}\n  \
             Estimado con la tasa de devolución actual: ${}\n\n\
             Para el profit completo resta el gasto en publicidad (servidor meta) y el costo de producto.",
            days,
            stats.total,
            stats.count(OrderState::Delivered),
            money(stats.delivered_value),
            pending,
            money(stats.pending_value),
            stats.count(OrderState::Returned),
            money(stats.returned_value),
            stats.count(OrderState::Cancelled),
            stats.delivery_rate(),
            stats.return_rate(),
            money(self.revenue()),
            money(stats.return_charges),
            money(self.net()),
            wallet,
            pending,
            money(stats.pending_value),
            money(self.projected_pending()),
        )
    }
}

/// Handlers of the `dropi` server.
pub struct DropiTools {
    settings: DropiSettings,
    upstream: Upstream,
}

impl DropiTools {
    /// Create the tool set.
    pub fn new(settings: DropiSettings, timeout: Duration) -> ToolResult<Self> {
        Ok(Self {
            settings,
            upstream: Upstream::new("Dropi", timeout)?,
        })
    }

    async fn get(&self, endpoint: &str, query: &[(&str, String)]) -> ToolResult<Value> {
        let token = self
            .settings
            .token
            .as_deref()
            .ok_or_else(|| ToolError::not_configured("Dropi", "DROPI_TOKEN is not set"))?;
        let url = format!("{}/api/{}", self.settings.base_url(), endpoint);
        let request = self
            .upstream
            .http()
            .get(url)
            .bearer_auth(token)
            .header("Accept", "application/json")
            .query(query);
        self.upstream.send(request).await
    }

    /// First candidate endpoint whose reply satisfies `accept`.
    ///
    /// Upstream failures move on to the next candidate; the last failure is
    /// returned when none answers. Configuration errors stop immediately.
    async fn first_available<T>(
        &self,
        candidates: &[Candidate],
        accept: impl Fn(&Value) -> Option<T>,
    ) -> ToolResult<Option<T>> {
        let mut last_error = None;
        for (endpoint, query) in candidates {
            match self.get(endpoint, query).await {
                Ok(body) => {
                    if let Some(found) = accept(&body) {
                        return Ok(Some(found));
                    }
                    debug!(service = self.upstream.service(), endpoint, "Reply had no usable data");
                }
                Err(error @ ToolError::Upstream { .. }) => {
                    debug!(service = self.upstream.service(), endpoint, %error, "Candidate endpoint failed");
                    last_error = Some(error);
                }
                Err(error) => return Err(error),
            }
        }
        match last_error {
            Some(error) => Err(error),
            None => Ok(None),
        }
    }

    async fn wallet(&self) -> ToolResult<ToolContent> {
        let candidates: Vec<Candidate> = WALLET_ENDPOINTS.iter().map(|e| (*e, Vec::new())).collect();
        let wallet = self.first_available(&candidates, extract_wallet).await?;

        let Some(wallet) = wallet else {
            return Err(ToolError::upstream(
                self.upstream.service(),
                "no wallet endpoint reported a balance",
            ));
        };

        Ok(ToolContent::Text(format!(
            "BILLETERA DROPI:\n\nSaldo disponible: ${}\nSaldo pendiente: ${}\nSaldo total: ${}\n\n\
             El saldo pendiente corresponde a pedidos entregados aún no liquidados.",
            money(wallet.available),
            money(wallet.pending),
            money(wallet.balance),
        )))
    }

    async fn wallet_history(&self, arguments: &Arguments) -> ToolResult<ToolContent> {
        let tool = DropiTool::WalletHistory.name();
        let days = opt_u64(arguments, tool, "days")?.unwrap_or(DEFAULT_DAYS);
        let kind = match opt_str(arguments, "type").map(str::to_uppercase) {
            None => None,
            Some(kind) if kind == "ENTRADA" => Some(MovementKind::Income),
            Some(kind) if kind == "SALIDA" => Some(MovementKind::Expense),
            Some(_) => {
                return Err(ToolError::invalid_argument(
                    tool,
                    format!("'type' must be one of {}", MOVEMENT_TYPES.join(", ")),
                ))
            }
        };
        let since = days_ago(days);
        let until = Utc::now().date_naive().to_string();

        let query = vec![
            ("orderBy", "id".to_string()),
            ("orderDirection", "desc".to_string()),
            ("result_number", "100".to_string()),
            ("start", "0".to_string()),
            ("from", since.clone()),
            ("until", until),
        ];
        let candidates: Vec<Candidate> = vec![("historywallet", query.clone()), ("wallet/history", query)];
        let raw = self
            .first_available(&candidates, |body| movement_list(body).cloned())
            .await?
            .unwrap_or_default();

        let history = WalletHistory::from_movements(
            raw.iter()
                .map(WalletMovement::from_value)
                .filter(|m| on_or_after(m.date.as_deref(), &since))
                .filter(|m| kind.map_or(true, |kind| m.kind == kind)),
        );

        if history.movements.is_empty() {
            return Ok(ToolContent::Text(format!(
                "No hay movimientos de cartera en los últimos {} días.",
                days
            )));
        }
        Ok(ToolContent::Text(history.render(days)))
    }

    async fn payments(&self, arguments: &Arguments) -> ToolResult<ToolContent> {
        let tool = DropiTool::Payments.name();
        let days = opt_u64(arguments, tool, "days")?.unwrap_or(DEFAULT_DAYS);
        let since = days_ago(days);

        let candidates: Vec<Candidate> = PAYMENT_ENDPOINTS
            .iter()
            .map(|e| (*e, vec![("from", since.clone())]))
            .collect();
        let payments: Vec<Payment> = self
            .first_available(&candidates, |body| payment_list(body).cloned())
            .await?
            .unwrap_or_default()
            .iter()
            .map(Payment::from_value)
            .filter(|p| on_or_after(p.date.as_deref(), &since))
            .collect();

        if payments.is_empty() {
            return Ok(ToolContent::Text(format!(
                "No hay pagos registrados en los últimos {} días.",
                days
            )));
        }

        let total: f64 = payments.iter().map(|p| p.amount).sum();
        let mut report = format!("PAGOS DROPI (últimos {} días):\n\n", days);
        for payment in payments.iter().take(LISTED_ROWS) {
            report.push_str(&format!(
                "${} | {} | {}\n",
                money(payment.amount),
                payment.date.as_deref().unwrap_or("N/A"),
                payment.status
            ));
        }
        report.push_str(&format!(
            "\nPagos: {}\nTOTAL RECIBIDO: ${}",
            payments.len(),
            money(total)
        ));
        Ok(ToolContent::Text(report))
    }

    async fn returns(&self, arguments: &Arguments) -> ToolResult<ToolContent> {
        let tool = DropiTool::Returns.name();
        let days = opt_u64(arguments, tool, "days")?.unwrap_or(DEFAULT_DAYS);
        let since = days_ago(days);

        let candidates: Vec<Candidate> = vec![
            (
                "orders",
                vec![
                    ("status", "returned".to_string()),
                    ("limit", "100".to_string()),
                    ("from", since.clone()),
                ],
            ),
            ("returns", vec![("from", since)]),
        ];
        let orders = self
            .first_available(&candidates, |body| return_list(body).cloned())
            .await?
            .unwrap_or_default();

        let summary = ReturnSummary::from_orders(&orders);
        if summary.orders.is_empty() {
            return Ok(ToolContent::Text(format!(
                "No hay devoluciones en los últimos {} días.",
                days
            )));
        }
        Ok(ToolContent::Text(summary.render()))
    }

    async fn profit_analysis(&self, arguments: &Arguments) -> ToolResult<ToolContent> {
        let tool = DropiTool::ProfitAnalysis.name();
        let days = opt_u64(arguments, tool, "days")?.unwrap_or(DEFAULT_DAYS);

        let body = self
            .get("orders", &[("limit", STATS_PAGE.to_string()), ("from", days_ago(days))])
            .await?;
        let orders = order_list(&body).cloned().unwrap_or_default();

        let wallet_candidates: Vec<Candidate> =
            WALLET_ENDPOINTS.iter().map(|e| (*e, Vec::new())).collect();
        let wallet_balance = match self.first_available(&wallet_candidates, extract_wallet).await {
            Ok(wallet) => wallet.map(|w| w.balance),
            Err(error) => {
                debug!(%error, "Wallet unavailable for profit analysis");
                None
            }
        };

        if orders.is_empty() {
            return Ok(ToolContent::Text(format!(
                "No hay órdenes en los últimos {} días para analizar la rentabilidad.",
                days
            )));
        }

        let analysis = ProfitAnalysis {
            stats: OrderStats::from_orders(&orders),
            wallet_balance,
        };
        Ok(ToolContent::Text(analysis.render(days)))
    }

    async fn orders(&self, arguments: &Arguments) -> ToolResult<ToolContent> {
        let tool = DropiTool::Orders.name();
        let status = opt_str(arguments, "status").filter(|s| !s.eq_ignore_ascii_case("all"));
        let limit = opt_u64(arguments, tool, "limit")?
            .unwrap_or(DEFAULT_ORDER_LIMIT)
            .clamp(1, MAX_ORDER_LIMIT);
        let days = opt_u64(arguments, tool, "days")?.unwrap_or(DEFAULT_DAYS);
        let since = days_ago(days);

        let with_status = |mut query: Vec<(&'static str, String)>| {
            if let Some(status) = status {
                query.push(("status", status.to_string()));
            }
            query
        };
        let candidates: Vec<Candidate> = vec![
            ("orders", with_status(vec![("limit", limit.to_string()), ("from", since)])),
            ("order", with_status(vec![("limit", limit.to_string())])),
            ("orders/list", with_status(vec![("limit", limit.to_string())])),
            ("user/orders", vec![("limit", limit.to_string())]),
        ];

        let orders = self
            .first_available(&candidates, |body| order_list(body).cloned())
            .await?
            .unwrap_or_default();

        if orders.is_empty() {
            return Ok(ToolContent::Text(format!(
                "No hay órdenes en los últimos {} días.",
                days
            )));
        }

        let summaries: Vec<OrderSummary> = orders
            .iter()
            .take(limit as usize)
            .map(OrderSummary::from_value)
            .collect();

        let mut per_status: BTreeMap<&str, usize> = BTreeMap::new();
        for summary in &summaries {
            *per_status.entry(summary.status.as_str()).or_default() += 1;
        }
        let total: f64 = summaries.iter().map(|s| s.amount).sum();

        let mut report = format!("ÓRDENES DROPI (últimos {} días):\n", days);
        for summary in &summaries {
            report.push_str(&format!("\n{}\n", summary.render()));
        }
        report.push_str("\nRESUMEN:\n");
        for (status, count) in &per_status {
            report.push_str(&format!("  {}: {}\n", status, count));
        }
        report.push_str(&format!("  Total: ${}", money(total)));

        Ok(ToolContent::Text(report))
    }

    async fn order_stats(&self, arguments: &Arguments) -> ToolResult<ToolContent> {
        let tool = DropiTool::OrderStats.name();
        let days = opt_u64(arguments, tool, "days")?.unwrap_or(DEFAULT_DAYS);
        let since = days_ago(days);

        let body = self
            .get("orders", &[("limit", STATS_PAGE.to_string()), ("from", since)])
            .await?;
        let orders = order_list(&body).cloned().unwrap_or_default();

        if orders.is_empty() {
            return Ok(ToolContent::Text(
                "No hay datos suficientes para generar estadísticas.".to_string(),
            ));
        }

        Ok(ToolContent::Text(OrderStats::from_orders(&orders).render(days)))
    }

    async fn account_info(&self) -> ToolResult<ToolContent> {
        let candidates: Vec<Candidate> = ACCOUNT_ENDPOINTS.iter().map(|e| (*e, Vec::new())).collect();
        let account = self
            .first_available(&candidates, |body| {
                let user = first_field(body, &["data", "user"]).unwrap_or(body);
                user.is_object().then(|| user.clone())
            })
            .await;

        let base_url = self.settings.base_url();
        let country = self.settings.country.to_uppercase();
        match account {
            Ok(Some(user)) => Ok(ToolContent::Text(format!(
                "CUENTA DROPI:\n\nNombre: {}\nEmail: {}\nTeléfono: {}\nPaís: {}\nEstado: {}\n\nPlataforma: {}",
                text_field(&user, &["name", "nombre"]).unwrap_or_else(|| "N/A".to_string()),
                text_field(&user, &["email"]).unwrap_or_else(|| "N/A".to_string()),
                text_field(&user, &["phone", "telefono"]).unwrap_or_else(|| "N/A".to_string()),
                text_field(&user, &["country", "pais"]).unwrap_or(country),
                text_field(&user, &["status", "estado"]).unwrap_or_else(|| "Activo".to_string()),
                base_url,
            ))),
            Ok(None) | Err(ToolError::Upstream { .. }) => Ok(ToolContent::Text(format!(
                "CUENTA DROPI:\n\nPlataforma: {}\nPaís: {}\nToken configurado: Sí\n\n\
                 No se pudo obtener más detalles de la cuenta.",
                base_url, country
            ))),
            Err(error) => Err(error),
        }
    }

    async fn search_order(&self, arguments: &Arguments) -> ToolResult<ToolContent> {
        let tool = DropiTool::SearchOrder.name();
        let query = req_str(arguments, tool, "query")?;

        match self.get(&format!("orders/{}", query), &[]).await {
            Ok(body) => {
                let order = body.get("data").filter(|d| d.is_object()).unwrap_or(&body);
                if order.is_object() && !order.as_object().is_some_and(Map::is_empty) {
                    return Ok(ToolContent::Text(format!(
                        "ORDEN ENCONTRADA:\n\nID: {}\nGuía: {}\nCliente: {}\nValor: ${}\nEstado: {}\nFecha: {}",
                        text_field(order, &["id"]).unwrap_or_else(|| "N/A".to_string()),
                        text_field(order, &["tracking_number"]).unwrap_or_else(|| "N/A".to_string()),
                        OrderSummary::from_value(order).customer,
                        money(number(order.get("total"))),
                        text_field(order, &["status"]).unwrap_or_else(|| "N/A".to_string()),
                        OrderSummary::from_value(order).date.unwrap_or_else(|| "N/A".to_string()),
                    )));
                }
            }
            Err(error @ ToolError::NotConfigured { .. }) => return Err(error),
            Err(error) => debug!(%error, query, "Direct order lookup failed, searching"),
        }

        let body = self
            .get("orders", &[("search", query.to_string()), ("limit", "10".to_string())])
            .await?;
        let orders = order_list(&body).cloned().unwrap_or_default();

        if orders.is_empty() {
            return Ok(ToolContent::Text(format!(
                "No se encontró ninguna orden con '{}'",
                query
            )));
        }

        let lines: Vec<String> = orders
            .iter()
            .take(5)
            .map(|order| OrderSummary::from_value(order).render())
            .collect();
        Ok(ToolContent::Text(format!(
            "Resultados para '{}':\n\n{}",
            query,
            lines.join("\n\n")
        )))
    }
}

/// The date `days` ago as `YYYY-MM-DD`.
fn days_ago(days: u64) -> String {
    Utc::now()
        .date_naive()
        .checked_sub_days(Days::new(days))
        .map(|d| d.to_string())
        .unwrap_or_default()
}

#[async_trait]
impl ToolSet for DropiTools {
    type Tool = DropiTool;

    fn server_name(&self) -> &str {
        "dropi"
    }

    async fn call(&self, tool: DropiTool, arguments: &Arguments) -> ToolResult<ToolContent> {
        match tool {
            DropiTool::Wallet => self.wallet().await,
            DropiTool::WalletHistory => self.wallet_history(arguments).await,
            DropiTool::Orders => self.orders(arguments).await,
            DropiTool::OrderStats => self.order_stats(arguments).await,
            DropiTool::Payments => self.payments(arguments).await,
            DropiTool::Returns => self.returns(arguments).await,
            DropiTool::ProfitAnalysis => self.profit_analysis(arguments).await,
            DropiTool::AccountInfo => self.account_info().await,
            DropiTool::SearchOrder => self.search_order(arguments).await,
        }
    }

    fn diagnostics(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("base_url".to_string(), json!(self.settings.base_url()));
        fields.insert("country".to_string(), json!(self.settings.country));
        fields.insert(
            "token_configured".to_string(),
            json!(self.settings.token.is_some()),
        );
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_wallet_shapes() {
        let flat = extract_wallet(&json!({"balance": "1500.50", "pending": 200})).unwrap();
        assert_eq!(flat.balance, 1500.5);
        assert_eq!(flat.pending, 200.0);
        assert_eq!(flat.available, 1500.5);

        let spanish = extract_wallet(&json!({"saldo": 900, "pendiente": "100", "disponible": 800})).unwrap();
        assert_eq!(spanish.balance, 900.0);
        assert_eq!(spanish.available, 800.0);

        let nested = extract_wallet(&json!({"data": {"balance": 42, "pending": 2}})).unwrap();
        assert_eq!(nested.balance, 42.0);
        assert_eq!(nested.pending, 2.0);

        assert!(extract_wallet(&json!({"message": "ok"})).is_none());
    }

    #[test]
    fn test_order_state_mapping() {
        assert_eq!(OrderState::from_raw("ENTREGADO"), OrderState::Delivered);
        assert_eq!(OrderState::from_raw("shipped"), OrderState::InProcess);
        assert_eq!(OrderState::from_raw("devuelto"), OrderState::Returned);
        assert_eq!(OrderState::from_raw("cancelled"), OrderState::Cancelled);
        assert_eq!(OrderState::from_raw("en bodega"), OrderState::Pending);
    }

    #[test]
    fn test_order_summary_fields() {
        let summary = OrderSummary::from_value(&json!({
            "order_id": 77,
            "estado": "pendiente",
            "client": {"name": "Luis"},
            "valor": "125.00",
            "fecha": "2025-11-18T09:00:00Z"
        }));

        assert_eq!(summary.id, "77");
        assert_eq!(summary.status, "pendiente");
        assert_eq!(summary.customer, "Luis");
        assert_eq!(summary.amount, 125.0);
        assert_eq!(summary.date.as_deref(), Some("2025-11-18"));
    }

    #[test]
    fn test_order_stats() {
        let orders = vec![
            json!({"status": "entregado", "total": 100}),
            json!({"status": "delivered", "total": 100}),
            json!({"status": "devuelto", "total": 50}),
            json!({"status": "something else", "total": 10}),
        ];

        let stats = OrderStats::from_orders(&orders);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.count(OrderState::Delivered), 2);
        assert_eq!(stats.count(OrderState::Pending), 1);
        assert_eq!(stats.delivery_rate(), 50.0);
        assert_eq!(stats.return_rate(), 25.0);
        assert_eq!(stats.delivered_value, 200.0);
        assert_eq!(stats.returned_value, 50.0);

        let text = stats.render(30);
        assert!(text.contains("Entregadas: 2 (50.0%)"));
        assert!(text.contains("Tasa de devolución: 25.0%"));
    }

    #[test]
    fn test_order_stats_pending_and_charges() {
        let orders = vec![
            json!({"status": "pendiente", "total": 80}),
            json!({"status": "shipped", "total": 20}),
            json!({"status": "devuelto", "total": 50, "return_charge": "12.5"}),
            json!({"status": "returned", "total": 30, "cobro_devolucion": 7.5}),
            json!({"status": "cancelado", "total": 99}),
        ];

        let stats = OrderStats::from_orders(&orders);
        assert_eq!(stats.pending_value, 100.0);
        assert_eq!(stats.returned_value, 80.0);
        assert_eq!(stats.return_charges, 20.0);
    }

    #[test]
    fn test_profit_analysis() {
        let orders = vec![
            json!({"status": "entregado", "total": 300}),
            json!({"status": "entregado", "total": 100}),
            json!({"status": "devuelto", "total": 50, "return_charge": 25}),
            json!({"status": "pendiente", "total": 200}),
        ];
        let analysis = ProfitAnalysis {
            stats: OrderStats::from_orders(&orders),
            wallet_balance: Some(1250.0),
        };

        assert_eq!(analysis.revenue(), 400.0);
        assert_eq!(analysis.net(), 375.0);
        // 25% return rate on 200 pending
        assert_eq!(analysis.projected_pending(), 150.0);

        let text = analysis.render(30);
        assert!(text.contains("Ingresos por entregas: $400.00"));
        assert!(text.contains("Cobros por devoluciones: $25.00"));
        assert!(text.contains("Neto Dropi: $375.00"));
        assert!(text.contains("Saldo en cartera: $1,250.00"));
        assert!(text.contains("Estimado con la tasa de devolución actual: $150.00"));

        let without_wallet = ProfitAnalysis {
            wallet_balance: None,
            ..analysis
        };
        assert!(without_wallet.render(7).contains("Saldo en cartera: no disponible"));
    }

    #[test]
    fn test_wallet_history_totals() {
        let body = json!({"data": {"objects": [
            {"type": "ENTRADA", "amount": "450.00", "order_id": 901, "created_at": "2025-11-18 10:00:00"},
            {"type": "SALIDA", "amount": 35, "order_id": 902, "created_at": "2025-11-17"},
            {"type": "entrada", "amount": 50, "created_at": "2025-11-16"},
            {"type": "COBRO", "amount": -15, "created_at": "2025-11-15"},
        ]}});

        let raw = movement_list(&body).unwrap();
        let history = WalletHistory::from_movements(raw.iter().map(WalletMovement::from_value));
        assert_eq!(history.income, 500.0);
        assert_eq!(history.expenses, 50.0);
        assert_eq!(history.net(), 450.0);
        assert_eq!(history.movements[0].order_id.as_deref(), Some("901"));
        assert_eq!(history.movements[0].date.as_deref(), Some("2025-11-18"));

        let text = history.render(30);
        assert!(text.contains("+ $450.00 | ENTRADA | Orden #901 | 2025-11-18"));
        assert!(text.contains("Entradas: $500.00 (2)"));
        assert!(text.contains("Salidas: $50.00 (2)"));
        assert!(text.contains("Neto: $450.00"));
    }

    #[test]
    fn test_movement_list_shapes() {
        assert_eq!(movement_list(&json!({"data": [{"type": "ENTRADA"}]})).map(Vec::len), Some(1));
        assert_eq!(movement_list(&json!({"objects": []})).map(Vec::len), Some(0));
        assert!(movement_list(&json!({"data": {"count": 0}})).is_none());
    }

    #[test]
    fn test_payments_and_date_window() {
        let body = json!({"payments": [
            {"monto": "300", "fecha": "2025-11-10T08:00:00Z"},
            {"amount": 120.5, "date": "2025-10-01", "status": "Pagado"},
        ]});
        let payments: Vec<Payment> = payment_list(&body)
            .unwrap()
            .iter()
            .map(Payment::from_value)
            .collect();

        assert_eq!(payments[0].amount, 300.0);
        assert_eq!(payments[0].date.as_deref(), Some("2025-11-10"));
        assert_eq!(payments[0].status, "Procesado");
        assert_eq!(payments[1].status, "Pagado");

        assert!(on_or_after(payments[0].date.as_deref(), "2025-11-01"));
        assert!(!on_or_after(payments[1].date.as_deref(), "2025-11-01"));
        assert!(on_or_after(None, "2025-11-01"));
    }

    #[test]
    fn test_return_summary() {
        let orders = vec![
            json!({"id": 11, "status": "devuelto", "total": 150, "motivo": "Cliente ausente", "return_charge": 30}),
            json!({"id": 12, "status": "entregado", "total": 999}),
            json!({"order_id": 13, "amount": 60}),
        ];

        let summary = ReturnSummary::from_orders(&orders);
        assert_eq!(summary.orders.len(), 2);
        assert_eq!(summary.orders[0].reason, "Cliente ausente");
        assert_eq!(summary.orders[1].id, "13");
        assert_eq!(summary.orders[1].reason, "Sin especificar");
        assert_eq!(summary.total_value, 210.0);
        assert_eq!(summary.total_charges, 30.0);

        let text = summary.render();
        assert!(text.contains("Cobro por devolución: $30.00"));
        assert!(text.contains("Valor perdido: $210.00"));
    }

    #[test]
    fn test_tool_table_lists_profit_tools() {
        let names: Vec<&str> = DropiTool::ALL.iter().map(|t| t.name()).collect();
        for name in [
            "get_dropi_wallet_history",
            "get_dropi_payments",
            "get_dropi_returns",
            "get_dropi_profit_analysis",
        ] {
            assert!(names.contains(&name), "{} missing", name);
        }
        assert_eq!(DropiTool::parse("get_dropi_returns"), Some(DropiTool::Returns));
    }

    #[tokio::test]
    async fn test_wallet_history_rejects_unknown_type() {
        let settings = DropiSettings {
            token: Some("t".to_string()),
            ..DropiSettings::default()
        };
        let tools = DropiTools::new(settings, Duration::from_secs(1)).unwrap();
        let arguments = json!({"type": "OTRO"}).as_object().cloned().unwrap();
        let result = tools.call(DropiTool::WalletHistory, &arguments).await;
        assert!(matches!(result, Err(ToolError::InvalidArgument { .. })));
    }

    #[test]
    fn test_order_list_keys() {
        assert_eq!(order_list(&json!({"orders": [1, 2]})).map(Vec::len), Some(2));
        assert_eq!(order_list(&json!({"data": {"x": 1}, "items": [1]})).map(Vec::len), Some(1));
        assert!(order_list(&json!({"data": null})).is_none());
    }

    #[tokio::test]
    async fn test_missing_token() {
        let tools = DropiTools::new(DropiSettings::default(), Duration::from_secs(1)).unwrap();
        let result = tools.call(DropiTool::Wallet, &Map::new()).await;
        assert!(matches!(result, Err(ToolError::NotConfigured { .. })));

        let result = tools.call(DropiTool::AccountInfo, &Map::new()).await;
        assert!(matches!(result, Err(ToolError::NotConfigured { .. })));

        for tool in [DropiTool::Payments, DropiTool::Returns, DropiTool::ProfitAnalysis, DropiTool::WalletHistory] {
            let result = tools.call(tool, &Map::new()).await;
            assert!(matches!(result, Err(ToolError::NotConfigured { .. })), "{:?}", tool);
        }
    }

    #[test]
    fn test_diagnostics_hide_token() {
        let settings = DropiSettings {
            token: Some("secret".to_string()),
            ..DropiSettings::default()
        };
        let tools = DropiTools::new(settings, Duration::from_secs(1)).unwrap();
        let diagnostics = tools.diagnostics();
        assert_eq!(diagnostics["token_configured"], json!(true));
        assert_eq!(diagnostics["base_url"], json!("https://app.dropi.gt"));
        assert!(!Value::Object(diagnostics).to_string().contains("secret"));
    }
}
