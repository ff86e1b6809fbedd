//! Test fixtures and builders.

use std::collections::BTreeMap;

use jiff::Timestamp;
use rust_decimal::Decimal;

use crate::{
    domain::{
        carts::models::{CartOwner, CartRecord, CartItemUuid, CartUuid, NewCart, NewCartItem,
            SessionUuid},
        coupons::models::{CouponKind, CouponRecord, CouponUuid, NewCoupon},
        orders::models::{
            Address, CheckoutRequest, OrderPaymentStatus, OrderRecord, OrderStatus, OrderUuid,
        },
        payments::models::PaymentMethod,
        products::models::{
            NewProduct, NewVariant, ProductRecord, ProductUuid, StockTarget, VariantRecord,
            VariantUuid,
        },
        shipping::models::{NewShippingRate, ShippingRateRecord, ShippingRateUuid},
        taxes::models::{NewTaxRule, TaxRuleRecord, TaxRuleUuid},
    },
    money::CurrencyCode,
    test::TestContext,
};

pub(crate) fn new_product(uuid: ProductUuid, price: Decimal, quantity: u32) -> NewProduct {
    NewProduct {
        uuid,
        name: "Desk Lamp".to_string(),
        sku: format!("SKU-{uuid}"),
        slug: format!("desk-lamp-{uuid}"),
        image: None,
        price,
        currency: CurrencyCode::usd(),
        is_active: true,
        is_published: true,
        track_quantity: true,
        quantity,
        categories: Vec::new(),
    }
}

pub(crate) async fn create_product(
    ctx: &TestContext,
    price: Decimal,
    quantity: u32,
) -> ProductRecord {
    ctx.app
        .products
        .create_product(ctx.tenant, new_product(ProductUuid::random(), price, quantity))
        .await
        .expect("product creation should succeed")
}

pub(crate) fn new_variant(
    product_uuid: ProductUuid,
    price: Option<Decimal>,
    quantity: u32,
) -> NewVariant {
    let uuid = VariantUuid::random();

    NewVariant {
        uuid,
        product_uuid,
        sku: format!("VAR-{uuid}"),
        price,
        attributes: BTreeMap::new(),
        is_active: true,
        quantity,
    }
}

pub(crate) async fn create_variant_for(
    ctx: &TestContext,
    product_uuid: ProductUuid,
    price: Option<Decimal>,
    quantity: u32,
) -> VariantRecord {
    ctx.app
        .products
        .create_variant(ctx.tenant, new_variant(product_uuid, price, quantity))
        .await
        .expect("variant creation should succeed")
}

pub(crate) async fn set_stock(ctx: &TestContext, product: ProductUuid, quantity: u32) {
    ctx.app
        .products
        .set_stock(ctx.tenant, StockTarget::Product(product), quantity)
        .await
        .expect("set_stock should succeed");
}

/// Rewrites a product's live price directly, bypassing the service surface,
/// to simulate a catalog edit after items entered carts.
pub(crate) async fn set_product_price(ctx: &TestContext, product: ProductUuid, price: Decimal) {
    let mut tx = ctx
        .db
        .begin_tenant_transaction(ctx.tenant)
        .await
        .expect("begin should succeed");

    let record = tx
        .state_mut()
        .products
        .get_mut(&product)
        .expect("product should exist");
    record.price = price;

    tx.commit();
}

pub(crate) fn new_fixed_coupon(
    code: &str,
    value: Decimal,
    minimum: Option<Decimal>,
) -> NewCoupon {
    NewCoupon {
        uuid: CouponUuid::random(),
        code: code.to_string(),
        name: format!("{code} test coupon"),
        kind: CouponKind::Fixed,
        value,
        minimum_amount: minimum,
        usage_limit: None,
        usage_limit_per_user: None,
        starts_at: None,
        expires_at: None,
        applicable_products: None,
        applicable_categories: None,
    }
}

pub(crate) async fn create_fixed_coupon(
    ctx: &TestContext,
    code: &str,
    value: Decimal,
    minimum: Option<Decimal>,
) -> CouponRecord {
    ctx.app
        .coupons
        .create_coupon(ctx.tenant, new_fixed_coupon(code, value, minimum))
        .await
        .expect("coupon creation should succeed")
}

pub(crate) fn new_tax_rule(country: &str, rate: Decimal, is_compound: bool) -> NewTaxRule {
    NewTaxRule {
        uuid: TaxRuleUuid::random(),
        name: format!("{country} tax"),
        country_code: country.to_string(),
        state: None,
        postal_code: None,
        city: None,
        rate,
        is_compound,
        min_amount: None,
        max_amount: None,
        applicable_categories: None,
        customer_groups: None,
        starts_at: None,
        expires_at: None,
    }
}

pub(crate) async fn add_tax_rule(
    ctx: &TestContext,
    country: &str,
    rate: Decimal,
    is_compound: bool,
) -> TaxRuleRecord {
    ctx.app
        .taxes
        .add_rule(ctx.tenant, new_tax_rule(country, rate, is_compound))
        .await
        .expect("tax rule creation should succeed")
}

pub(crate) async fn add_shipping_rate(
    ctx: &TestContext,
    country: &str,
    amount: Decimal,
    free_above: Option<Decimal>,
) -> ShippingRateRecord {
    ctx.app
        .shipping
        .add_rate(
            ctx.tenant,
            NewShippingRate {
                uuid: ShippingRateUuid::random(),
                country_code: country.to_string(),
                amount,
                free_above,
            },
        )
        .await
        .expect("shipping rate creation should succeed")
}

/// A cart owned by the context's default customer.
pub(crate) async fn create_cart(ctx: &TestContext) -> CartRecord {
    ctx.app
        .carts
        .create_cart(
            ctx.tenant,
            NewCart {
                uuid: CartUuid::random(),
                owner: CartOwner::Customer(ctx.customer),
                currency: None,
            },
        )
        .await
        .expect("cart creation should succeed")
}

/// A cart owned by a fresh anonymous session.
pub(crate) async fn create_session_cart(ctx: &TestContext) -> CartRecord {
    ctx.app
        .carts
        .create_cart(
            ctx.tenant,
            NewCart {
                uuid: CartUuid::random(),
                owner: CartOwner::Session(SessionUuid::random()),
                currency: None,
            },
        )
        .await
        .expect("cart creation should succeed")
}

pub(crate) fn new_cart_item(product_uuid: ProductUuid, quantity: u32) -> NewCartItem {
    NewCartItem {
        uuid: CartItemUuid::random(),
        product_uuid,
        variant_uuid: None,
        quantity,
    }
}

pub(crate) fn address() -> Address {
    Address {
        name: "Ada Lovelace".to_string(),
        line1: "12 Orchard Row".to_string(),
        line2: None,
        city: "London".to_string(),
        state: None,
        postal_code: "N1 9GU".to_string(),
        country_code: "GB".to_string(),
        phone: None,
    }
}

pub(crate) fn checkout_request(cart_uuid: CartUuid) -> CheckoutRequest {
    CheckoutRequest {
        cart_uuid,
        shipping_address: address(),
        billing_address: None,
        notes: None,
        payment_method: PaymentMethod::Card,
    }
}

/// A bare order header for exercising the ledger without a full checkout.
pub(crate) fn order_fixture(
    subtotal: Decimal,
    tax: Decimal,
    shipping: Decimal,
    discount: Decimal,
) -> OrderRecord {
    let now = Timestamp::now();
    let uuid = OrderUuid::random();

    OrderRecord {
        uuid,
        number: format!("SO-19700101-{}", &uuid.to_string()[..6].to_ascii_uppercase()),
        placed_by: CartOwner::Session(SessionUuid::random()),
        currency: CurrencyCode::usd(),
        subtotal,
        tax_amount: tax,
        shipping_amount: shipping,
        discount_amount: discount,
        total: (subtotal + tax + shipping - discount).max(Decimal::ZERO),
        status: OrderStatus::Pending,
        payment_status: OrderPaymentStatus::Pending,
        coupon: None,
        shipping_address: address(),
        billing_address: address(),
        notes: None,
        items: Vec::new(),
        placed_at: now,
        updated_at: now,
    }
}
