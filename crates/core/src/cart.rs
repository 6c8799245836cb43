//! Cart data model and line-list rules.
//!
//! The line list is keyed by [`VariantId`]: adding a variant that is already
//! in the cart merges into the existing line, and a line whose quantity would
//! drop to zero is removed instead of kept. Derived figures (subtotal, item
//! count, savings) are computed on demand and never stored.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{CheckoutId, DiscountPercent, VariantId};

// =============================================================================
// Cart Lines
// =============================================================================

/// One variant in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    /// Variant id, unique within the cart.
    pub variant_id: VariantId,
    /// Always at least 1.
    pub quantity: u32,
    /// Product title shown to the shopper.
    pub title: String,
    /// Thumbnail reference (URL or asset key).
    #[serde(default)]
    pub thumbnail: Option<String>,
    /// Price per unit actually charged.
    pub unit_price: Decimal,
    /// Pre-discount unit price, when the variant is on sale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_unit_price: Option<Decimal>,
    /// Advertised discount percentage, when the variant is on sale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_percent: Option<DiscountPercent>,
    /// Size label of the variant.
    #[serde(default)]
    pub size: Option<String>,
}

impl CartLine {
    /// `unit_price * quantity`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }

    /// Amount saved against the original price across the whole line.
    #[must_use]
    pub fn savings(&self) -> Decimal {
        self.original_unit_price
            .filter(|original| *original > self.unit_price)
            .map_or(Decimal::ZERO, |original| {
                (original - self.unit_price) * Decimal::from(self.quantity)
            })
    }
}

/// Descriptive and pricing data supplied when a variant is added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineDetails {
    pub title: String,
    pub thumbnail: Option<String>,
    pub unit_price: Decimal,
    pub original_unit_price: Option<Decimal>,
    pub discount_percent: Option<DiscountPercent>,
    pub size: Option<String>,
}

impl LineDetails {
    /// Details with only the required title and unit price.
    #[must_use]
    pub fn new(title: impl Into<String>, unit_price: Decimal) -> Self {
        Self {
            title: title.into(),
            thumbnail: None,
            unit_price,
            original_unit_price: None,
            discount_percent: None,
            size: None,
        }
    }

    #[must_use]
    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }

    #[must_use]
    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = Some(size.into());
        self
    }

    /// Mark the variant as discounted from `original` by `percent`.
    #[must_use]
    pub fn with_sale(mut self, original: Decimal, percent: DiscountPercent) -> Self {
        self.original_unit_price = Some(original);
        self.discount_percent = Some(percent);
        self
    }
}

/// Result of a merge-by-key addition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineChange {
    /// A new line was appended.
    Added,
    /// An existing line's quantity grew.
    Merged,
    /// The request carried a zero quantity; nothing changed.
    Ignored,
}

/// The ordered list of cart lines, unique by variant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartLines(Vec<CartLine>);

impl CartLines {
    /// An empty line list.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Build a list from raw lines, merging duplicates and dropping zero quantities.
    #[must_use]
    pub fn from_lines(lines: Vec<CartLine>) -> Self {
        let mut list = Self::new();
        for line in lines {
            if line.quantity == 0 {
                continue;
            }
            match list.find_mut(&line.variant_id) {
                Some(existing) => {
                    existing.quantity = existing.quantity.saturating_add(line.quantity);
                }
                None => list.0.push(line),
            }
        }
        list
    }

    /// Add `quantity` units of a variant, merging into an existing line.
    ///
    /// On merge only the quantity grows; the original price and discount
    /// percentage are backfilled when the existing line did not know them,
    /// never overwritten.
    pub fn add(&mut self, variant_id: VariantId, quantity: u32, details: LineDetails) -> LineChange {
        if quantity == 0 {
            return LineChange::Ignored;
        }

        if let Some(existing) = self.find_mut(&variant_id) {
            existing.quantity = existing.quantity.saturating_add(quantity);
            if existing.original_unit_price.is_none() {
                existing.original_unit_price = details.original_unit_price;
            }
            if existing.discount_percent.is_none() {
                existing.discount_percent = details.discount_percent;
            }
            return LineChange::Merged;
        }

        self.0.push(CartLine {
            variant_id,
            quantity,
            title: details.title,
            thumbnail: details.thumbnail,
            unit_price: details.unit_price,
            original_unit_price: details.original_unit_price,
            discount_percent: details.discount_percent,
            size: details.size,
        });
        LineChange::Added
    }

    /// Remove a line, returning it if it was present.
    pub fn remove(&mut self, variant_id: &VariantId) -> Option<CartLine> {
        let index = self.0.iter().position(|l| &l.variant_id == variant_id)?;
        Some(self.0.remove(index))
    }

    /// Increment a line's quantity by one. Returns `false` if the line is absent.
    pub fn increase(&mut self, variant_id: &VariantId) -> bool {
        self.find_mut(variant_id).is_some_and(|line| {
            line.quantity = line.quantity.saturating_add(1);
            true
        })
    }

    /// Decrement a line's quantity by one, removing it when it reaches zero.
    /// Returns `false` if the line is absent.
    pub fn decrease(&mut self, variant_id: &VariantId) -> bool {
        let Some(line) = self.find_mut(variant_id) else {
            return false;
        };
        if line.quantity <= 1 {
            self.remove(variant_id);
        } else {
            line.quantity -= 1;
        }
        true
    }

    /// Set a line's quantity; zero removes it. Returns `false` if the line is absent.
    pub fn set_quantity(&mut self, variant_id: &VariantId, quantity: u32) -> bool {
        if quantity == 0 {
            return self.remove(variant_id).is_some();
        }
        self.find_mut(variant_id).is_some_and(|line| {
            line.quantity = quantity;
            true
        })
    }

    /// Remove every line matching `predicate`, returning the removed lines.
    pub fn remove_where(&mut self, mut predicate: impl FnMut(&CartLine) -> bool) -> Vec<CartLine> {
        let (removed, kept): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.0).into_iter().partition(|l| predicate(l));
        self.0 = kept;
        removed
    }

    /// Look up a line by variant.
    #[must_use]
    pub fn get(&self, variant_id: &VariantId) -> Option<&CartLine> {
        self.0.iter().find(|l| &l.variant_id == variant_id)
    }

    fn find_mut(&mut self, variant_id: &VariantId) -> Option<&mut CartLine> {
        self.0.iter_mut().find(|l| &l.variant_id == variant_id)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[CartLine] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CartLine> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of all line totals.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.0.iter().map(CartLine::line_total).sum()
    }

    /// Total number of units across lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.0.iter().fold(0, |acc, l| acc.saturating_add(l.quantity))
    }

    /// Total saved against original prices.
    #[must_use]
    pub fn savings(&self) -> Decimal {
        self.0.iter().map(CartLine::savings).sum()
    }
}

impl<'a> IntoIterator for &'a CartLines {
    type Item = &'a CartLine;
    type IntoIter = std::slice::Iter<'a, CartLine>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// =============================================================================
// Checkout Handle
// =============================================================================

/// Identity of the server-side checkout backing this cart, if one exists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutHandle {
    pub remote_id: Option<CheckoutId>,
    pub remote_token: Option<String>,
}

impl CheckoutHandle {
    /// No remote checkout created yet.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            remote_id: None,
            remote_token: None,
        }
    }

    /// A created remote checkout.
    #[must_use]
    pub fn created(remote_id: CheckoutId, remote_token: Option<String>) -> Self {
        Self {
            remote_id: Some(remote_id),
            remote_token,
        }
    }

    #[must_use]
    pub const fn is_created(&self) -> bool {
        self.remote_id.is_some()
    }
}

// =============================================================================
// Voucher State
// =============================================================================

/// Active promo code and the discount it grants.
///
/// Fields are private: a code is present exactly when the discount amount is
/// positive, and the constructors are the only way to build a value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoucherState {
    code: Option<String>,
    discount_amount: Decimal,
}

impl VoucherState {
    /// No voucher applied.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            code: None,
            discount_amount: Decimal::ZERO,
        }
    }

    /// An applied voucher. Returns `None` unless `discount_amount` is positive
    /// and the code is non-empty.
    #[must_use]
    pub fn active(code: impl Into<String>, discount_amount: Decimal) -> Option<Self> {
        let code = code.into();
        if code.is_empty() || discount_amount <= Decimal::ZERO {
            return None;
        }
        Some(Self {
            code: Some(code),
            discount_amount,
        })
    }

    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    #[must_use]
    pub const fn discount_amount(&self) -> Decimal {
        self.discount_amount
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.code.is_some()
    }

    /// Whether `code` is the currently applied code, ignoring ASCII case.
    #[must_use]
    pub fn is_applied(&self, code: &str) -> bool {
        self.code
            .as_deref()
            .is_some_and(|applied| applied.eq_ignore_ascii_case(code))
            && self.discount_amount > Decimal::ZERO
    }
}

// =============================================================================
// Persisted Snapshot
// =============================================================================

/// What survives a reload: the checkout handle and the line list.
///
/// Voucher state is deliberately absent; it is revalidated every session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSnapshot {
    #[serde(default)]
    pub checkout: CheckoutHandle,
    #[serde(default)]
    pub lines: CartLines,
}

impl PersistedSnapshot {
    /// Parse a stored snapshot. Duplicate or zero-quantity lines written by an
    /// older client are normalised on the way in.
    ///
    /// # Errors
    ///
    /// Returns the JSON error if the payload is not a snapshot.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let raw: Self = serde_json::from_str(json)?;
        Ok(Self {
            checkout: raw.checkout,
            lines: CartLines::from_lines(raw.lines.0),
        })
    }

    /// Serialize for storage.
    ///
    /// # Errors
    ///
    /// Returns the JSON error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Where the hydrated cart's checkout linkage came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HydrationSource {
    /// Remote checkout confirmed by the API.
    #[serde(rename = "api")]
    Api,
    /// Persisted local snapshot only.
    #[serde(rename = "localStorage")]
    LocalStorage,
}

impl HydrationSource {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::LocalStorage => "localStorage",
        }
    }
}

impl std::fmt::Display for HydrationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn details(title: &str, price: &str) -> LineDetails {
        LineDetails::new(title, Decimal::from_str(price).unwrap())
    }

    #[test]
    fn test_add_same_variant_merges() {
        let mut lines = CartLines::new();
        let id = VariantId::new("v1");
        assert_eq!(lines.add(id.clone(), 1, details("Tee", "10")), LineChange::Added);
        assert_eq!(lines.add(id.clone(), 2, details("Tee", "10")), LineChange::Merged);

        assert_eq!(lines.len(), 1);
        assert_eq!(lines.get(&id).unwrap().quantity, 3);
    }

    #[test]
    fn test_merge_backfills_but_never_overwrites_pricing() {
        let mut lines = CartLines::new();
        let id = VariantId::new("v1");
        let pct = DiscountPercent::new(20).unwrap();
        let other_pct = DiscountPercent::new(50).unwrap();

        lines.add(id.clone(), 1, details("Tee", "8"));
        lines.add(
            id.clone(),
            1,
            details("Tee", "8").with_sale(Decimal::from(10), pct),
        );
        let line = lines.get(&id).unwrap();
        assert_eq!(line.original_unit_price, Some(Decimal::from(10)));
        assert_eq!(line.discount_percent, Some(pct));

        lines.add(
            id.clone(),
            1,
            details("Tee", "8").with_sale(Decimal::from(16), other_pct),
        );
        let line = lines.get(&id).unwrap();
        assert_eq!(line.original_unit_price, Some(Decimal::from(10)));
        assert_eq!(line.discount_percent, Some(pct));
        assert_eq!(line.quantity, 3);
    }

    #[test]
    fn test_zero_quantity_add_is_ignored() {
        let mut lines = CartLines::new();
        assert_eq!(
            lines.add(VariantId::new("v1"), 0, details("Tee", "10")),
            LineChange::Ignored
        );
        assert!(lines.is_empty());
    }

    #[test]
    fn test_decrease_to_zero_removes_line() {
        let mut lines = CartLines::new();
        let id = VariantId::new("v1");
        lines.add(id.clone(), 2, details("Tee", "10"));

        assert!(lines.decrease(&id));
        assert_eq!(lines.get(&id).unwrap().quantity, 1);
        assert!(lines.decrease(&id));
        assert!(lines.get(&id).is_none());
        assert!(!lines.decrease(&id));
    }

    #[test]
    fn test_set_quantity_zero_removes() {
        let mut lines = CartLines::new();
        let id = VariantId::new("v1");
        lines.add(id.clone(), 2, details("Tee", "10"));
        assert!(lines.set_quantity(&id, 5));
        assert_eq!(lines.item_count(), 5);
        assert!(lines.set_quantity(&id, 0));
        assert!(lines.is_empty());
    }

    #[test]
    fn test_totals_are_derived() {
        let mut lines = CartLines::new();
        lines.add(
            VariantId::new("a"),
            2,
            details("A", "7.50").with_sale(Decimal::from(10), DiscountPercent::new(25).unwrap()),
        );
        lines.add(VariantId::new("b"), 1, details("B", "3"));

        assert_eq!(lines.subtotal(), Decimal::from(18));
        assert_eq!(lines.item_count(), 3);
        assert_eq!(lines.savings(), Decimal::from(5));
    }

    #[test]
    fn test_voucher_state_invariant() {
        assert!(VoucherState::active("SALE10", Decimal::ZERO).is_none());
        assert!(VoucherState::active("", Decimal::ONE).is_none());

        let voucher = VoucherState::active("SALE10", Decimal::from(10)).unwrap();
        assert!(voucher.is_applied("SALE10"));
        assert!(!voucher.is_applied("OTHER"));
        assert!(voucher.is_applied("sale10"));
        assert!(!VoucherState::none().is_active());
        assert_eq!(VoucherState::none().discount_amount(), Decimal::ZERO);
    }

    #[test]
    fn test_snapshot_json_shape() {
        let mut lines = CartLines::new();
        lines.add(VariantId::new("v1"), 1, details("Tee", "10"));
        let snapshot = PersistedSnapshot {
            checkout: CheckoutHandle::created(CheckoutId::new("abc"), Some("tok".to_string())),
            lines,
        };

        let json = snapshot.to_json().unwrap();
        assert!(json.contains("\"remoteId\":\"abc\""));
        assert!(json.contains("\"variantId\":\"v1\""));
        assert!(!json.contains("voucher"));
        assert_eq!(PersistedSnapshot::from_json(&json).unwrap(), snapshot);
    }

    #[test]
    fn test_snapshot_normalises_duplicates() {
        let json = r#"{"checkout":{"remoteId":null,"remoteToken":null},"lines":[
            {"variantId":"v1","quantity":1,"title":"Tee","unitPrice":"10"},
            {"variantId":"v1","quantity":2,"title":"Tee","unitPrice":"10"},
            {"variantId":"v2","quantity":0,"title":"Cap","unitPrice":"5"}
        ]}"#;
        let snapshot = PersistedSnapshot::from_json(json).unwrap();
        assert_eq!(snapshot.lines.len(), 1);
        assert_eq!(snapshot.lines.item_count(), 3);
    }

    #[test]
    fn test_hydration_source_wire_names() {
        assert_eq!(serde_json::to_string(&HydrationSource::Api).unwrap(), "\"api\"");
        assert_eq!(HydrationSource::LocalStorage.to_string(), "localStorage");
    }
}
