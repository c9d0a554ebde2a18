use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for deriving adoption IDs from company/product pairs.
const ADOPTION_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6b, 0x1f, 0x09, 0x2e, 0x4c, 0x8d, 0x4a, 0x71, 0x9f, 0x3b, 0xd2, 0x5e, 0x80, 0x17, 0xaa, 0x04,
]);

/// Unique identifier for a company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompanyId(Uuid);

impl CompanyId {
    /// Creates a new random company ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a company ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for CompanyId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CompanyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for CompanyId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Unique identifier for a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(Uuid);

impl ProductId {
    /// Creates a new random product ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a product ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ProductId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ProductId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Identifier for an adoption aggregate: one company's relationship with one
/// product.
///
/// Derived deterministically (UUIDv5) from the company and product IDs, so the
/// same pair always maps to the same aggregate and exactly one aggregate
/// exists per pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdoptionId(Uuid);

impl AdoptionId {
    /// Derives the adoption ID for a company/product pair.
    pub fn derive(company_id: CompanyId, product_id: ProductId) -> Self {
        let mut name = [0u8; 32];
        name[..16].copy_from_slice(company_id.as_uuid().as_bytes());
        name[16..].copy_from_slice(product_id.as_uuid().as_bytes());
        Self(Uuid::new_v5(&ADOPTION_NAMESPACE, &name))
    }

    /// Creates an adoption ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for AdoptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for AdoptionId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<AdoptionId> for Uuid {
    fn from(id: AdoptionId) -> Self {
        id.0
    }
}

/// The kind of principal issuing a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    /// A human user.
    User,
    /// A background job or internal service.
    System,
    /// An AI enrichment collaborator acting through the command layer.
    Ai,
}

impl ActorKind {
    /// Returns the kind name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorKind::User => "user",
            ActorKind::System => "system",
            ActorKind::Ai => "ai",
        }
    }
}

impl std::fmt::Display for ActorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The principal responsible for a state change, recorded on every event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// What kind of principal this is.
    pub kind: ActorKind,

    /// Principal identifier (user ID, job name, model name).
    pub id: String,
}

impl Actor {
    /// Creates an actor.
    pub fn new(kind: ActorKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    /// Creates a human user actor.
    pub fn user(id: impl Into<String>) -> Self {
        Self::new(ActorKind::User, id)
    }

    /// Creates a system actor.
    pub fn system(id: impl Into<String>) -> Self {
        Self::new(ActorKind::System, id)
    }

    /// Creates an AI collaborator actor.
    pub fn ai(id: impl Into<String>) -> Self {
        Self::new(ActorKind::Ai, id)
    }
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}
