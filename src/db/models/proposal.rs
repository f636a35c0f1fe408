use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use super::program::Program;

/// Lifecycle stages, in advancement order. `Cancelled` sits outside the order.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type, ToSchema)]
#[sqlx(type_name = "estado_propuesta", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProposalStage {
    Creada,
    RevisionJp,
    RevisionSubdireccion,
    Preconciliada,
    Conciliada,
    Cancelada,
}

impl ProposalStage {
    pub const ORDER: [ProposalStage; 5] = [
        Self::Creada,
        Self::RevisionJp,
        Self::RevisionSubdireccion,
        Self::Preconciliada,
        Self::Conciliada,
    ];

    /// Stages hidden from the default listing.
    pub const CLOSED: [ProposalStage; 2] = [Self::Conciliada, Self::Cancelada];

    pub fn next(self) -> Option<Self> {
        let idx = Self::ORDER.iter().position(|s| *s == self)?;
        Self::ORDER.get(idx + 1).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Creada => "CREADA",
            Self::RevisionJp => "REVISION_JP",
            Self::RevisionSubdireccion => "REVISION_SUBDIRECCION",
            Self::Preconciliada => "PRECONCILIADA",
            Self::Conciliada => "CONCILIADA",
            Self::Cancelada => "CANCELADA",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ORDER
            .iter()
            .chain(std::iter::once(&Self::Cancelada))
            .copied()
            .find(|s| s.as_str().eq_ignore_ascii_case(raw.trim()))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, FromRow, ToSchema)]
pub struct Proposal {
    pub id: i32,
    pub nombre: String,
    pub periodo: Option<String>,
    pub estado: ProposalStage,
    pub created_at: NaiveDateTime,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct ProposalDetail {
    pub propuesta: Proposal,
    pub programas: Vec<Program>,
}

#[derive(Deserialize, Debug, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProposalFilterParams {
    pub page: Option<u32>,
    pub size: Option<u32>,
    /// Comma separated stage list, e.g. `PRECONCILIADA,CONCILIADA`.
    pub estado: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct AdvanceResponse {
    pub avanzada: bool,
    pub estado: ProposalStage,
    pub mensaje: String,
    pub solicitudes_cerradas: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct NewProposal {
    pub nombre: String,
    pub periodo: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct ImportRequest {
    pub url: String,
    pub propuesta: NewProposal,
}

#[derive(Serialize, Deserialize, Debug, Default, ToSchema)]
pub struct ImportSummary {
    pub propuesta_id: i32,
    pub usuarios: usize,
    pub carteras: usize,
    pub programas: usize,
    pub oportunidades: usize,
    pub filas_omitidas: usize,
}
