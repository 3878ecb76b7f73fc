//! SQL backend built on SeaORM.
//!
//! Cart writes are guarded by the `version` column and replace the cart's
//! line-item rows inside one transaction. `settle` runs the wallet debit, the
//! cart clear and the settlement insert in a single transaction. The new
//! balance is computed in `Decimal` and written with a compare-and-swap on the
//! balance that was read, so a wallet that changed underneath is a conflict.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, SqlErr,
};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{CartStore, ProductCatalog, SettlementStore, StoreError, UserStore};
use crate::db::with_transaction;
use crate::entities::{cart, cart_item, product, settlement, user};
use crate::models::{
    Cart, CartItem, Email, NewUser, PaymentOption, Product, Settlement, SettlementReceipt, User,
};

impl From<DbErr> for StoreError {
    fn from(err: DbErr) -> Self {
        if let Some(SqlErr::UniqueConstraintViolation(detail)) = err.sql_err() {
            return StoreError::AlreadyExists(detail);
        }
        match err {
            DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => StoreError::Unavailable(err.to_string()),
            DbErr::RecordNotFound(what) => StoreError::NotFound(what),
            other => StoreError::Backend(other.to_string()),
        }
    }
}

fn corrupt(what: &str, detail: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(format!("corrupt {} row: {}", what, detail))
}

fn parse_email(raw: &str) -> Result<Email, StoreError> {
    Email::parse(raw).map_err(|e| corrupt("email", e))
}

impl From<product::Model> for Product {
    fn from(model: product::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            category: model.category,
            cost: model.cost,
            rating: model.rating,
            image: model.image,
        }
    }
}

impl TryFrom<user::Model> for User {
    type Error = StoreError;

    fn try_from(model: user::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            name: model.name,
            email: parse_email(&model.email)?,
            password_hash: model.password_hash,
            wallet_money: model.wallet_money,
            address: model.address,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

impl TryFrom<settlement::Model> for SettlementReceipt {
    type Error = StoreError;

    fn try_from(model: settlement::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            user_id: model.user_id,
            email: parse_email(&model.email)?,
            total: model.total,
            wallet_before: model.wallet_before,
            wallet_after: model.wallet_after,
            item_count: u32::try_from(model.item_count).map_err(|e| corrupt("settlement", e))?,
            created_at: model.created_at,
        })
    }
}

fn cart_from_rows(header: cart::Model, items: Vec<cart_item::Model>) -> Result<Cart, StoreError> {
    let cart_items = items
        .into_iter()
        .map(|row| {
            let quantity = u32::try_from(row.quantity).map_err(|e| corrupt("cart item", e))?;
            let product = Product {
                id: row.product_id,
                name: row.name,
                category: row.category,
                cost: row.cost,
                rating: row.rating,
                image: row.image,
            };
            Ok(CartItem::new(product, quantity))
        })
        .collect::<Result<Vec<_>, StoreError>>()?;

    Ok(Cart {
        id: header.id,
        email: parse_email(&header.email)?,
        cart_items,
        payment_option: PaymentOption::from_str(&header.payment_option)
            .map_err(|e| corrupt("cart", e))?,
        version: header.version,
        created_at: header.created_at,
        updated_at: header.updated_at,
    })
}

fn item_rows(cart: &Cart) -> Result<Vec<cart_item::ActiveModel>, StoreError> {
    cart.items()
        .iter()
        .enumerate()
        .map(|(position, item)| {
            Ok(cart_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart.id),
                product_id: Set(item.product.id),
                position: Set(i32::try_from(position).map_err(|e| corrupt("cart item", e))?),
                name: Set(item.product.name.clone()),
                category: Set(item.product.category.clone()),
                cost: Set(item.product.cost),
                rating: Set(item.product.rating),
                image: Set(item.product.image.clone()),
                quantity: Set(i32::try_from(item.quantity)
                    .map_err(|_| StoreError::Backend("quantity out of range".into()))?),
            })
        })
        .collect()
}

async fn load_cart<C: ConnectionTrait>(
    conn: &C,
    email: &Email,
) -> Result<Option<Cart>, StoreError> {
    let Some(header) = cart::Entity::find()
        .filter(cart::Column::Email.eq(email.as_str()))
        .one(conn)
        .await?
    else {
        return Ok(None);
    };

    let items = cart_item::Entity::find()
        .filter(cart_item::Column::CartId.eq(header.id))
        .order_by_asc(cart_item::Column::Position)
        .all(conn)
        .await?;

    cart_from_rows(header, items).map(Some)
}

#[derive(Debug, Clone)]
pub struct SeaOrmStore {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Adds a catalog product. Used by seeding and tests.
    pub async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        product::Entity::insert(product::ActiveModel {
            id: Set(product.id),
            name: Set(product.name.clone()),
            category: Set(product.category.clone()),
            cost: Set(product.cost),
            rating: Set(product.rating),
            image: Set(product.image.clone()),
        })
        .exec_without_returning(self.db.as_ref())
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ProductCatalog for SeaOrmStore {
    async fn find_by_id(&self, product_id: Uuid) -> Result<Option<Product>, StoreError> {
        Ok(product::Entity::find_by_id(product_id)
            .one(self.db.as_ref())
            .await?
            .map(Product::from))
    }

    async fn list(&self) -> Result<Vec<Product>, StoreError> {
        Ok(product::Entity::find()
            .order_by_asc(product::Column::Name)
            .order_by_asc(product::Column::Id)
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(Product::from)
            .collect())
    }
}

#[async_trait]
impl CartStore for SeaOrmStore {
    async fn find_by_owner(&self, email: &Email) -> Result<Option<Cart>, StoreError> {
        load_cart(self.db.as_ref(), email).await
    }

    #[instrument(skip(self))]
    async fn create(
        &self,
        email: &Email,
        payment_option: PaymentOption,
    ) -> Result<Cart, StoreError> {
        let cart = Cart::new(email.clone(), payment_option);
        cart::Entity::insert(cart::ActiveModel {
            id: Set(cart.id),
            email: Set(email.as_str().to_string()),
            payment_option: Set(payment_option.to_string()),
            version: Set(cart.version),
            created_at: Set(cart.created_at),
            updated_at: Set(cart.updated_at),
        })
        .exec_without_returning(self.db.as_ref())
        .await?;
        Ok(cart)
    }

    #[instrument(skip(self))]
    async fn find_or_create(
        &self,
        email: &Email,
        payment_option: PaymentOption,
    ) -> Result<Cart, StoreError> {
        let fresh = Cart::new(email.clone(), payment_option);
        let inserted = cart::Entity::insert(cart::ActiveModel {
            id: Set(fresh.id),
            email: Set(email.as_str().to_string()),
            payment_option: Set(payment_option.to_string()),
            version: Set(fresh.version),
            created_at: Set(fresh.created_at),
            updated_at: Set(fresh.updated_at),
        })
        .on_conflict(
            OnConflict::column(cart::Column::Email)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(self.db.as_ref())
        .await?;
        debug!(inserted, "cart upsert");

        load_cart(self.db.as_ref(), email)
            .await?
            .ok_or_else(|| StoreError::Backend(format!("cart for {} vanished after upsert", email)))
    }

    #[instrument(skip(self, cart), fields(email = %cart.email, version = cart.version))]
    async fn save(&self, cart: &Cart) -> Result<Cart, StoreError> {
        let mut saved = cart.clone();
        saved.version += 1;
        saved.updated_at = Utc::now();
        let rows = item_rows(&saved)?;

        let result = saved.clone();
        with_transaction(self.db.as_ref(), move |txn| {
            Box::pin(async move {
                let updated = cart::Entity::update_many()
                    .col_expr(cart::Column::Version, Expr::value(saved.version))
                    .col_expr(
                        cart::Column::PaymentOption,
                        Expr::value(saved.payment_option.to_string()),
                    )
                    .col_expr(cart::Column::UpdatedAt, Expr::value(saved.updated_at))
                    .filter(cart::Column::Id.eq(saved.id))
                    .filter(cart::Column::Version.eq(saved.version - 1))
                    .exec(txn)
                    .await?
                    .rows_affected;

                if updated == 0 {
                    let exists = cart::Entity::find_by_id(saved.id).one(txn).await?.is_some();
                    return Err(if exists {
                        StoreError::Conflict(format!(
                            "cart for {} changed since version {}",
                            saved.email,
                            saved.version - 1
                        ))
                    } else {
                        StoreError::NotFound(format!("cart for {}", saved.email))
                    });
                }

                cart_item::Entity::delete_many()
                    .filter(cart_item::Column::CartId.eq(saved.id))
                    .exec(txn)
                    .await?;
                if !rows.is_empty() {
                    cart_item::Entity::insert_many(rows)
                        .exec_without_returning(txn)
                        .await?;
                }
                Ok::<(), StoreError>(())
            })
        })
        .await?;

        Ok(result)
    }
}

#[async_trait]
impl UserStore for SeaOrmStore {
    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        user::Entity::find_by_id(user_id)
            .one(self.db.as_ref())
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn find_by_email(&self, email: &Email) -> Result<Option<User>, StoreError> {
        user::Entity::find()
            .filter(user::Column::Email.eq(email.as_str()))
            .one(self.db.as_ref())
            .await?
            .map(User::try_from)
            .transpose()
    }

    #[instrument(skip(self, new_user), fields(email = %new_user.email))]
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let user = new_user.into_user();
        user::Entity::insert(user::ActiveModel {
            id: Set(user.id),
            name: Set(user.name.clone()),
            email: Set(user.email.as_str().to_string()),
            password_hash: Set(user.password_hash.clone()),
            wallet_money: Set(user.wallet_money),
            address: Set(user.address.clone()),
            created_at: Set(user.created_at),
            updated_at: Set(user.updated_at),
        })
        .exec_without_returning(self.db.as_ref())
        .await?;
        Ok(user)
    }

    #[instrument(skip(self, address))]
    async fn update_address(&self, user_id: Uuid, address: &str) -> Result<User, StoreError> {
        let updated = user::Entity::update_many()
            .col_expr(user::Column::Address, Expr::value(address.to_string()))
            .col_expr(user::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(user::Column::Id.eq(user_id))
            .exec(self.db.as_ref())
            .await?
            .rows_affected;
        if updated == 0 {
            return Err(StoreError::NotFound(format!("user {}", user_id)));
        }

        UserStore::find_by_id(self, user_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("user {}", user_id)))
    }
}

#[async_trait]
impl SettlementStore for SeaOrmStore {
    #[instrument(skip(self, settlement), fields(settlement_id = %settlement.id, total = %settlement.total))]
    async fn settle(&self, settlement: &Settlement) -> Result<SettlementReceipt, StoreError> {
        let settlement = settlement.clone();
        with_transaction(self.db.as_ref(), move |txn| {
            Box::pin(async move {
                if settlement::Entity::find_by_id(settlement.id)
                    .one(txn)
                    .await?
                    .is_some()
                {
                    return Err(StoreError::AlreadyExists(format!(
                        "settlement {}",
                        settlement.id
                    )));
                }

                let wallet_before = user::Entity::find_by_id(settlement.user_id)
                    .one(txn)
                    .await?
                    .map(|row| row.wallet_money)
                    .ok_or_else(|| StoreError::NotFound(format!("user {}", settlement.user_id)))?;

                let cart_row = cart::Entity::find()
                    .filter(cart::Column::Email.eq(settlement.email.as_str()))
                    .one(txn)
                    .await?
                    .ok_or_else(|| {
                        StoreError::NotFound(format!("cart for {}", settlement.email))
                    })?;
                if cart_row.version != settlement.cart_version {
                    return Err(StoreError::Conflict(format!(
                        "cart for {} changed during checkout",
                        settlement.email
                    )));
                }

                if wallet_before < settlement.total {
                    return Err(StoreError::InsufficientFunds);
                }
                let wallet_after = wallet_before - settlement.total;

                // Balance arithmetic stays in Decimal; SQLite would do it in REAL.
                let now = Utc::now();
                let debited = user::Entity::update_many()
                    .col_expr(user::Column::WalletMoney, Expr::value(wallet_after))
                    .col_expr(user::Column::UpdatedAt, Expr::value(now))
                    .filter(user::Column::Id.eq(settlement.user_id))
                    .filter(user::Column::WalletMoney.eq(wallet_before))
                    .exec(txn)
                    .await?
                    .rows_affected;
                if debited == 0 {
                    return Err(StoreError::Conflict(format!(
                        "wallet of user {} changed during checkout",
                        settlement.user_id
                    )));
                }

                let cleared = cart::Entity::update_many()
                    .col_expr(cart::Column::Version, Expr::value(cart_row.version + 1))
                    .col_expr(cart::Column::UpdatedAt, Expr::value(now))
                    .filter(cart::Column::Id.eq(cart_row.id))
                    .filter(cart::Column::Version.eq(settlement.cart_version))
                    .exec(txn)
                    .await?
                    .rows_affected;
                if cleared == 0 {
                    return Err(StoreError::Conflict(format!(
                        "cart for {} changed during checkout",
                        settlement.email
                    )));
                }
                cart_item::Entity::delete_many()
                    .filter(cart_item::Column::CartId.eq(cart_row.id))
                    .exec(txn)
                    .await?;

                let mut receipt = SettlementReceipt::from_settlement(&settlement, wallet_before);
                receipt.created_at = now;

                settlement::Entity::insert(settlement::ActiveModel {
                    id: Set(receipt.id),
                    user_id: Set(receipt.user_id),
                    email: Set(receipt.email.as_str().to_string()),
                    total: Set(receipt.total),
                    wallet_before: Set(receipt.wallet_before),
                    wallet_after: Set(receipt.wallet_after),
                    item_count: Set(i32::try_from(receipt.item_count)
                        .map_err(|e| corrupt("settlement", e))?),
                    created_at: Set(receipt.created_at),
                })
                .exec_without_returning(txn)
                .await?;

                Ok(receipt)
            })
        })
        .await
    }

    async fn find_settlement(&self, id: Uuid) -> Result<Option<SettlementReceipt>, StoreError> {
        settlement::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .map(SettlementReceipt::try_from)
            .transpose()
    }
}
