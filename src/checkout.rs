//! Order-request construction.
//!
//! Every rule here is checked before the gateway is touched; a draft that
//! fails validation never produces a network call.

use tracing::info;

use crate::error::{OrderError, ValidationError};
use crate::gateway::OrderGateway;
use crate::models::cart::CartLine;
use crate::models::customer::{CustomerIdentity, DeliveryAddress, PaymentDetails};
use crate::models::order::{CreateOrderRequest, Order, OrderItemRequest};

/// Everything the storefront has gathered at the moment "place order" is pressed.
#[derive(Debug, Clone, Default)]
pub struct OrderDraft {
    pub cart: Vec<CartLine>,
    pub address: Option<DeliveryAddress>,
    pub payment: Option<PaymentDetails>,
    pub customer: CustomerIdentity,
    pub merchant_id: Option<i64>,
    pub special_instructions: Option<String>,
}

pub fn build_order_request(draft: &OrderDraft) -> Result<CreateOrderRequest, ValidationError> {
    if draft.cart.is_empty() {
        return Err(ValidationError::EmptyCart);
    }

    let user_id = draft
        .customer
        .id
        .filter(|id| *id > 0)
        .ok_or(ValidationError::MissingCustomer)?;

    let merchant_id = draft
        .merchant_id
        .filter(|id| *id > 0)
        .ok_or(ValidationError::MissingMerchant)?;

    let address = draft
        .address
        .as_ref()
        .ok_or(ValidationError::IncompleteAddress("street line"))?;
    if let Some(missing) = address.missing_component() {
        return Err(ValidationError::IncompleteAddress(missing));
    }

    let payment = draft
        .payment
        .as_ref()
        .ok_or(ValidationError::IncompletePayment("card number"))?;
    if let Some(missing) = payment.missing_component() {
        return Err(ValidationError::IncompletePayment(missing));
    }

    let items = resolve_lines(&draft.cart)?;

    if draft.cart.iter().any(|line| line.is_alcohol) && !draft.customer.age_verified {
        return Err(ValidationError::AgeVerificationRequired);
    }

    let special_instructions = draft
        .special_instructions
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Ok(CreateOrderRequest {
        user_id,
        merchant_id,
        delivery_address: address.format(),
        special_instructions,
        items,
    })
}

/// Turns cart lines into request items. A line without a usable price is an
/// error; it is never sent as zero.
pub fn resolve_lines(lines: &[CartLine]) -> Result<Vec<OrderItemRequest>, ValidationError> {
    if lines.is_empty() {
        return Err(ValidationError::EmptyCart);
    }

    lines
        .iter()
        .enumerate()
        .map(|(index, line)| {
            let invalid = |reason: &str| ValidationError::InvalidLine {
                index,
                reason: reason.to_string(),
            };

            if line.product_id <= 0 {
                return Err(invalid("product id must be positive"));
            }
            if line.quantity == 0 {
                return Err(invalid("quantity must be at least 1"));
            }
            let unit_price = line
                .unit_price()
                .ok_or_else(|| invalid("unit price is missing or not a non-negative number"))?;

            Ok(OrderItemRequest {
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price,
            })
        })
        .collect()
}

/// Last line of defence before `POST /orders`, for requests not built by
/// [`build_order_request`].
pub fn validate_request(request: &CreateOrderRequest) -> Result<(), ValidationError> {
    if request.user_id <= 0 {
        return Err(ValidationError::MissingCustomer);
    }
    if request.merchant_id <= 0 {
        return Err(ValidationError::MissingMerchant);
    }
    if request.delivery_address.trim().is_empty() {
        return Err(ValidationError::IncompleteAddress("street line"));
    }
    if request.items.is_empty() {
        return Err(ValidationError::EmptyCart);
    }

    for (index, item) in request.items.iter().enumerate() {
        let reason = if item.product_id <= 0 {
            "product id must be positive"
        } else if item.quantity == 0 {
            "quantity must be at least 1"
        } else if !item.unit_price.is_finite() || item.unit_price < 0.0 {
            "unit price is missing or not a non-negative number"
        } else {
            continue;
        };

        return Err(ValidationError::InvalidLine {
            index,
            reason: reason.to_string(),
        });
    }

    Ok(())
}

/// Validates the draft and creates the order. Creation errors are returned
/// once and never retried.
pub async fn place_order(
    gateway: &dyn OrderGateway,
    draft: &OrderDraft,
) -> Result<Order, OrderError> {
    let request = build_order_request(draft)?;
    let order = gateway.create(&request).await?;

    info!(
        order_id = order.id,
        items = request.items.len(),
        status = %order.status.as_str(),
        "order placed"
    );

    Ok(order)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::models::cart::PriceInput;
    use crate::models::order::OrderStatus;

    #[derive(Default)]
    struct RecordingGateway {
        created: Mutex<Vec<CreateOrderRequest>>,
    }

    #[async_trait]
    impl OrderGateway for RecordingGateway {
        async fn create(&self, request: &CreateOrderRequest) -> Result<Order, OrderError> {
            self.created.lock().unwrap().push(request.clone());
            Ok(Order {
                id: 42,
                user_id: Some(request.user_id),
                merchant_id: Some(request.merchant_id),
                driver_id: None,
                total_amount: None,
                status: OrderStatus::new(OrderStatus::PENDING),
                delivery_address: Some(request.delivery_address.clone()),
                items: Vec::new(),
                created_at: None,
                updated_at: None,
                estimated_delivery_time: None,
            })
        }

        async fn get_by_id(&self, order_id: i64) -> Result<Order, OrderError> {
            Err(OrderError::NotFound(format!("order {order_id}")))
        }
    }

    fn line(product_id: i64, quantity: u32, price: Option<PriceInput>) -> CartLine {
        CartLine {
            product_id,
            name: None,
            quantity,
            price,
            is_alcohol: false,
        }
    }

    fn draft() -> OrderDraft {
        OrderDraft {
            cart: vec![line(7, 2, Some(PriceInput::Number(5.0)))],
            address: Some(DeliveryAddress {
                line1: "1 Main St".to_string(),
                line2: String::new(),
                city: "Springfield".to_string(),
                state: "IL".to_string(),
                zip: "62701".to_string(),
            }),
            payment: Some(PaymentDetails {
                card_name: "Pat".to_string(),
                card_number: "4242424242424242".to_string(),
                exp: "12/29".to_string(),
                cvc: "123".to_string(),
            }),
            customer: CustomerIdentity {
                id: Some(3),
                age_verified: false,
            },
            merchant_id: Some(9),
            special_instructions: Some("  ".to_string()),
        }
    }

    #[tokio::test]
    async fn valid_draft_is_sent_with_exactly_the_validated_fields() {
        let gateway = RecordingGateway::default();

        let order = place_order(&gateway, &draft()).await.unwrap();
        assert_eq!(order.id, 42);

        let created = gateway.created.lock().unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(
            created[0],
            CreateOrderRequest {
                user_id: 3,
                merchant_id: 9,
                delivery_address: "1 Main St, Springfield, IL, 62701".to_string(),
                special_instructions: None,
                items: vec![OrderItemRequest {
                    product_id: 7,
                    quantity: 2,
                    unit_price: 5.0,
                }],
            }
        );
    }

    #[tokio::test]
    async fn invalid_drafts_never_reach_the_gateway() {
        let gateway = RecordingGateway::default();

        let mut empty = draft();
        empty.cart.clear();

        let mut no_city = draft();
        if let Some(address) = no_city.address.as_mut() {
            address.city.clear();
        }

        let mut no_price = draft();
        no_price.cart.push(line(8, 1, None));

        let mut bad_price = draft();
        bad_price.cart[0].price = Some(PriceInput::Text("n/a".to_string()));

        let mut no_address = draft();
        no_address.address = None;

        let cases = [
            (empty, ValidationError::EmptyCart),
            (no_city, ValidationError::IncompleteAddress("city")),
            (
                no_price,
                ValidationError::InvalidLine {
                    index: 1,
                    reason: "unit price is missing or not a non-negative number".to_string(),
                },
            ),
            (
                bad_price,
                ValidationError::InvalidLine {
                    index: 0,
                    reason: "unit price is missing or not a non-negative number".to_string(),
                },
            ),
            (no_address, ValidationError::IncompleteAddress("street line")),
        ];

        for (bad, expected) in cases {
            let err = place_order(&gateway, &bad).await.unwrap_err();
            match err {
                OrderError::Validation(actual) => assert_eq!(actual, expected),
                other => panic!("expected validation error, got {other:?}"),
            }
        }

        assert!(gateway.created.lock().unwrap().is_empty());
    }

    #[test]
    fn zero_price_is_accepted_but_zero_quantity_is_not() {
        let mut free_sample = draft();
        free_sample.cart[0].price = Some(PriceInput::Number(0.0));
        assert!(build_order_request(&free_sample).is_ok());

        let mut none = draft();
        none.cart[0].quantity = 0;
        assert!(matches!(
            build_order_request(&none),
            Err(ValidationError::InvalidLine { index: 0, .. })
        ));
    }

    #[test]
    fn alcohol_requires_age_verification() {
        let mut beer = draft();
        beer.cart[0].is_alcohol = true;
        assert_eq!(
            build_order_request(&beer),
            Err(ValidationError::AgeVerificationRequired)
        );

        beer.customer.age_verified = true;
        assert!(build_order_request(&beer).is_ok());
    }

    #[test]
    fn missing_identities_and_payment_are_rejected() {
        let mut anonymous = draft();
        anonymous.customer.id = None;
        assert_eq!(
            build_order_request(&anonymous),
            Err(ValidationError::MissingCustomer)
        );

        let mut no_merchant = draft();
        no_merchant.merchant_id = None;
        assert_eq!(
            build_order_request(&no_merchant),
            Err(ValidationError::MissingMerchant)
        );

        let mut no_payment = draft();
        no_payment.payment = None;
        assert_eq!(
            build_order_request(&no_payment),
            Err(ValidationError::IncompletePayment("card number"))
        );
    }

    #[test]
    fn hand_built_requests_are_checked_too() {
        let mut request = build_order_request(&draft()).unwrap();
        assert!(validate_request(&request).is_ok());

        request.items[0].unit_price = f64::INFINITY;
        assert!(matches!(
            validate_request(&request),
            Err(ValidationError::InvalidLine { index: 0, .. })
        ));

        request.items.clear();
        assert_eq!(validate_request(&request), Err(ValidationError::EmptyCart));
    }
}
