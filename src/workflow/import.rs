//! Turns a reconciliation CSV into a deduplicated import plan.
//!
//! Users are keyed by e-mail (or name when there is none), carteras by name,
//! programs by code, and opportunities by `(name, program code)`. The first
//! row seen for a key wins. Rows that cannot be read are counted and skipped;
//! only an unreadable file or missing columns fail the whole import.

use std::collections::HashMap;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::utils::error::AppError;
use crate::workflow::pricing::{is_atypical_price_ratio, is_atypical_ratio};

pub const REQUIRED_COLUMNS: [&str; 5] = [
    "usuario.nombre",
    "cartera.nombre",
    "programa.codigo",
    "programa.nombre",
    "oportunidad.nombre",
];

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("CSV inválido: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV inválido: faltan columnas {0:?}")]
    MissingColumns(Vec<&'static str>),

    #[error("No se pudo descargar el CSV: {0}")]
    Download(String),

    #[error("El CSV supera el tamaño máximo de {0} bytes")]
    TooLarge(usize),
}

impl From<ImportError> for AppError {
    fn from(err: ImportError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

/// One CSV line, as text.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportRow {
    #[serde(rename = "usuario.nombre")]
    pub usuario_nombre: String,
    #[serde(rename = "usuario.email", default)]
    pub usuario_email: Option<String>,
    #[serde(rename = "cartera.nombre")]
    pub cartera_nombre: String,
    #[serde(rename = "programa.codigo")]
    pub programa_codigo: String,
    #[serde(rename = "programa.nombre")]
    pub programa_nombre: String,
    #[serde(rename = "programa.precio_lista", default)]
    pub programa_precio_lista: Option<String>,
    #[serde(rename = "programa.fecha_inauguracion", default)]
    pub programa_fecha_inauguracion: Option<String>,
    #[serde(rename = "oportunidad.nombre")]
    pub oportunidad_nombre: String,
    #[serde(rename = "oportunidad.monto", default)]
    pub oportunidad_monto: Option<String>,
    #[serde(rename = "oportunidad.descuento", default)]
    pub oportunidad_descuento: Option<String>,
    #[serde(rename = "oportunidad.etapa", default)]
    pub oportunidad_etapa: Option<String>,
    #[serde(rename = "oportunidad.becado", default)]
    pub oportunidad_becado: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedUser {
    pub key: String,
    pub nombre: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedCartera {
    pub nombre: String,
    pub owner_key: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedProgram {
    pub codigo: String,
    pub nombre: String,
    pub cartera: String,
    pub precio_lista: Option<BigDecimal>,
    pub fecha_inauguracion: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedOpportunity {
    pub nombre: String,
    pub programa_codigo: String,
    pub monto: Option<BigDecimal>,
    pub descuento: Option<BigDecimal>,
    pub etapa: Option<String>,
    pub becado: bool,
    pub descuento_atipico: bool,
    pub ratio_atipico: bool,
}

#[derive(Debug, Default)]
pub struct ImportPlan {
    pub users: Vec<PlannedUser>,
    pub carteras: Vec<PlannedCartera>,
    pub programs: Vec<PlannedProgram>,
    pub opportunities: Vec<PlannedOpportunity>,
    pub skipped: usize,
}

/// Reads the CSV body. Rows whose fields do not deserialize are skipped.
pub fn parse_rows(data: &[u8]) -> Result<(Vec<ImportRow>, usize), ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(data);

    let headers = reader.headers()?.clone();
    let missing: Vec<&'static str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|col| !headers.iter().any(|h| h == *col))
        .collect();
    if !missing.is_empty() {
        return Err(ImportError::MissingColumns(missing));
    }

    let mut rows = Vec::new();
    let mut skipped = 0;
    for record in reader.deserialize::<ImportRow>() {
        match record {
            Ok(row) => rows.push(row),
            Err(err) if matches!(err.kind(), csv::ErrorKind::Deserialize { .. }) => {
                tracing::warn!(error = %err, "skipping unreadable CSV row");
                skipped += 1;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok((rows, skipped))
}

/// Builds the plan from parsed rows. `skipped` carries the parse-stage count.
pub fn plan_import(rows: &[ImportRow], skipped: usize) -> ImportPlan {
    let mut plan = ImportPlan {
        skipped,
        ..ImportPlan::default()
    };
    let mut user_idx: HashMap<String, usize> = HashMap::new();
    let mut cartera_idx: HashMap<String, usize> = HashMap::new();
    let mut program_idx: HashMap<String, usize> = HashMap::new();
    let mut opportunity_idx: HashMap<(String, String), usize> = HashMap::new();

    for (line, row) in rows.iter().enumerate() {
        let program = match plan_program(row) {
            Ok(program) => program,
            Err(reason) => {
                tracing::warn!(line = line + 2, %reason, "skipping CSV row");
                plan.skipped += 1;
                continue;
            }
        };
        let opportunity = match plan_opportunity(row) {
            Ok(opportunity) => opportunity,
            Err(reason) => {
                tracing::warn!(line = line + 2, %reason, "skipping CSV row");
                plan.skipped += 1;
                continue;
            }
        };
        if row.usuario_nombre.is_empty() || row.cartera_nombre.is_empty() {
            tracing::warn!(line = line + 2, "skipping CSV row without owner or cartera");
            plan.skipped += 1;
            continue;
        }

        let email = row.usuario_email.clone().filter(|e| !e.is_empty());
        let user_key = email
            .as_deref()
            .unwrap_or(&row.usuario_nombre)
            .to_lowercase();
        user_idx.entry(user_key.clone()).or_insert_with(|| {
            plan.users.push(PlannedUser {
                key: user_key.clone(),
                nombre: row.usuario_nombre.clone(),
                email,
            });
            plan.users.len() - 1
        });

        cartera_idx.entry(row.cartera_nombre.clone()).or_insert_with(|| {
            plan.carteras.push(PlannedCartera {
                nombre: row.cartera_nombre.clone(),
                owner_key: user_key.clone(),
            });
            plan.carteras.len() - 1
        });

        let program_pos = *program_idx.entry(program.codigo.clone()).or_insert_with(|| {
            plan.programs.push(program);
            plan.programs.len() - 1
        });
        let list_price = plan.programs[program_pos].precio_lista.clone();

        let key = (opportunity.nombre.clone(), opportunity.programa_codigo.clone());
        if opportunity_idx.contains_key(&key) {
            continue;
        }
        let mut opportunity = opportunity;
        opportunity.ratio_atipico = opportunity
            .monto
            .as_ref()
            .is_some_and(|m| is_atypical_price_ratio(m, list_price.as_ref()));
        plan.opportunities.push(opportunity);
        opportunity_idx.insert(key, plan.opportunities.len() - 1);
    }

    plan
}

fn plan_program(row: &ImportRow) -> Result<PlannedProgram, String> {
    if row.programa_codigo.is_empty() {
        return Err("programa.codigo vacío".into());
    }
    Ok(PlannedProgram {
        codigo: row.programa_codigo.clone(),
        nombre: row.programa_nombre.clone(),
        cartera: row.cartera_nombre.clone(),
        precio_lista: parse_decimal(row.programa_precio_lista.as_deref(), "programa.precio_lista")?,
        fecha_inauguracion: parse_date(row.programa_fecha_inauguracion.as_deref())?,
    })
}

fn plan_opportunity(row: &ImportRow) -> Result<PlannedOpportunity, String> {
    if row.oportunidad_nombre.is_empty() {
        return Err("oportunidad.nombre vacío".into());
    }
    let descuento = parse_decimal(row.oportunidad_descuento.as_deref(), "oportunidad.descuento")?;
    Ok(PlannedOpportunity {
        nombre: row.oportunidad_nombre.clone(),
        programa_codigo: row.programa_codigo.clone(),
        monto: parse_decimal(row.oportunidad_monto.as_deref(), "oportunidad.monto")?,
        descuento_atipico: descuento.as_ref().is_some_and(is_atypical_ratio),
        descuento,
        etapa: row.oportunidad_etapa.clone().filter(|e| !e.is_empty()),
        becado: parse_flag(row.oportunidad_becado.as_deref()),
        ratio_atipico: false,
    })
}

fn parse_decimal(raw: Option<&str>, column: &str) -> Result<Option<BigDecimal>, String> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => BigDecimal::from_str(&s.replace(',', "."))
            .map(Some)
            .map_err(|e| format!("{column}: {e}")),
    }
}

fn parse_date(raw: Option<&str>) -> Result<Option<NaiveDate>, String> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .or_else(|_| NaiveDate::parse_from_str(s, "%d-%m-%Y"))
            .or_else(|_| NaiveDate::parse_from_str(s, "%d/%m/%Y"))
            .map(Some)
            .map_err(|e| format!("programa.fecha_inauguracion: {e}")),
    }
}

fn parse_flag(raw: Option<&str>) -> bool {
    matches!(
        raw.map(|s| s.trim().to_lowercase()).as_deref(),
        Some("1" | "true" | "si" | "sí" | "x")
    )
}
