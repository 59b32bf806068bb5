//! Identifiers of external entities (catalog service, identity service)
//! that orders reference. The engine treats them as opaque.

use diesel::sql_types::Uuid as SqlUuid;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, From, FromStr, Hash, Serialize, Deserialize, FromSqlRow, AsExpression)]
#[sql_type = "SqlUuid"]
pub struct ShopId(Uuid);
newtype_from_to_sql!(SqlUuid, ShopId, ShopId);

impl ShopId {
    pub fn new(id: Uuid) -> Self {
        ShopId(id)
    }

    pub fn inner(&self) -> &Uuid {
        &self.0
    }
}

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, From, FromStr, Hash, Serialize, Deserialize, FromSqlRow, AsExpression)]
#[sql_type = "SqlUuid"]
pub struct UserId(Uuid);
newtype_from_to_sql!(SqlUuid, UserId, UserId);

impl UserId {
    pub fn new(id: Uuid) -> Self {
        UserId(id)
    }

    pub fn inner(&self) -> &Uuid {
        &self.0
    }
}

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, From, FromStr, Hash, Serialize, Deserialize, FromSqlRow, AsExpression)]
#[sql_type = "SqlUuid"]
pub struct ProductId(Uuid);
newtype_from_to_sql!(SqlUuid, ProductId, ProductId);

impl ProductId {
    pub fn new(id: Uuid) -> Self {
        ProductId(id)
    }

    pub fn inner(&self) -> &Uuid {
        &self.0
    }
}

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, From, FromStr, Hash, Serialize, Deserialize, FromSqlRow, AsExpression)]
#[sql_type = "SqlUuid"]
pub struct DeliveryPersonId(Uuid);
newtype_from_to_sql!(SqlUuid, DeliveryPersonId, DeliveryPersonId);

impl DeliveryPersonId {
    pub fn new(id: Uuid) -> Self {
        DeliveryPersonId(id)
    }

    pub fn inner(&self) -> &Uuid {
        &self.0
    }
}
