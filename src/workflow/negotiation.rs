//! Accept/reject rules for requests ("solicitudes").
//!
//! A request row is loaded into a [`RequestState`], whose [`RequestKind`]
//! carries the typed payload of its detail link. [`RequestState::transition`]
//! applies one decision and returns the side effects that must be written to
//! the linked program or opportunity. Nothing in here touches the database.
//!
//! Ping-pong types (program exclusion, add student, scholarship removal) never
//! spawn new rows: every rejection swaps generator and receiver and flips the
//! [`Negotiation`] direction, and the next acceptance is read through it.

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{json, Value};

use crate::db::models::opportunity::STAGE_ADDED;
use crate::db::models::request::{
    OpportunityLink, ProgramLink, Request, RequestType, RequestValue,
};
use crate::utils::error::AppError;
use crate::workflow::pricing::discount_ratio;

pub const UNKNOWN_USER: &str = "Usuario no encontrado";
pub const UNKNOWN_ENTITY: &str = "-";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("Falta el campo requerido: {0}")]
    MissingField(&'static str),

    #[error("Valor de transición inválido: {0:?}, se espera ACEPTADO o RECHAZADO")]
    InvalidTarget(RequestValue),

    #[error("Entidad vinculada no encontrada para la solicitud {0}")]
    LinkNotFound(i32),

    #[error("La solicitud {0} está cerrada")]
    Closed(i32),

    #[error("Solo el receptor actual puede responder la solicitud {0}")]
    NotReceiver(i32),
}

impl From<WorkflowError> for AppError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::MissingField(field) => AppError::MissingField(field),
            WorkflowError::NotReceiver(_) => AppError::Forbidden(err.to_string()),
            _ => AppError::BadRequest(err.to_string()),
        }
    }
}

/// Which way an acceptance points for ping-pong types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Negotiation {
    /// Accepting applies the change the request was opened for.
    Forward,
    /// Accepting undoes it: the counterpart accepted a rejection.
    Inverted,
}

impl Negotiation {
    pub fn from_flag(inverted: bool) -> Self {
        if inverted {
            Self::Inverted
        } else {
            Self::Forward
        }
    }

    pub fn is_inverted(self) -> bool {
        matches!(self, Self::Inverted)
    }

    pub fn flip(self) -> Self {
        match self {
            Self::Forward => Self::Inverted,
            Self::Inverted => Self::Forward,
        }
    }
}

/// Offer and counter-offer of an amount or date negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Offer<T> {
    pub proposed: Option<T>,
    pub objected: Option<T>,
}

impl<T> Offer<T> {
    pub fn opening(value: T) -> Self {
        Self {
            proposed: Some(value),
            objected: None,
        }
    }

    /// The value currently on the table.
    pub fn latest(&self) -> Option<&T> {
        self.proposed.as_ref().or(self.objected.as_ref())
    }

    /// The rejected proposal becomes the objected one; a counter-offer, if any,
    /// becomes the new proposal. Without one the two fields swap.
    pub fn counter(&mut self, counter: Option<T>) {
        match counter {
            Some(value) => {
                self.objected = self.proposed.take();
                self.proposed = Some(value);
            }
            None => std::mem::swap(&mut self.proposed, &mut self.objected),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalLevel {
    ProductManager,
    Commercial,
    Finance,
}

impl ApprovalLevel {
    pub fn request_type(self) -> RequestType {
        match self {
            Self::ProductManager => RequestType::AprobacionJp,
            Self::Commercial => RequestType::AprobacionComercial,
            Self::Finance => RequestType::AprobacionDaf,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestKind {
    ProgramExclusion {
        program_id: i32,
        negotiation: Negotiation,
    },
    AddStudent {
        opportunity_id: i32,
        negotiation: Negotiation,
        previous_stage: Option<String>,
        previous_enrollment: Option<NaiveDate>,
    },
    ScholarshipRemoval {
        opportunity_id: i32,
        negotiation: Negotiation,
    },
    StudentEdit {
        opportunity_id: i32,
        amounts: Offer<BigDecimal>,
    },
    DateChange {
        program_id: i32,
        dates: Offer<NaiveDate>,
    },
    Approval(ApprovalLevel),
}

impl RequestKind {
    pub fn request_type(&self) -> RequestType {
        match self {
            Self::ProgramExclusion { .. } => RequestType::ExclusionPrograma,
            Self::AddStudent { .. } => RequestType::AgregarAlumno,
            Self::ScholarshipRemoval { .. } => RequestType::EliminacionBecado,
            Self::StudentEdit { .. } => RequestType::EdicionAlumno,
            Self::DateChange { .. } => RequestType::FechaCambiada,
            Self::Approval(level) => level.request_type(),
        }
    }

    pub fn negotiation(&self) -> Option<Negotiation> {
        match self {
            Self::ProgramExclusion { negotiation, .. }
            | Self::AddStudent { negotiation, .. }
            | Self::ScholarshipRemoval { negotiation, .. } => Some(*negotiation),
            _ => None,
        }
    }

    pub fn opportunity_id(&self) -> Option<i32> {
        match self {
            Self::AddStudent { opportunity_id, .. }
            | Self::ScholarshipRemoval { opportunity_id, .. }
            | Self::StudentEdit { opportunity_id, .. } => Some(*opportunity_id),
            _ => None,
        }
    }

    pub fn program_id(&self) -> Option<i32> {
        match self {
            Self::ProgramExclusion { program_id, .. } | Self::DateChange { program_id, .. } => {
                Some(*program_id)
            }
            _ => None,
        }
    }

    fn is_approval(&self) -> bool {
        self.request_type().is_approval()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Reject,
}

impl TryFrom<RequestValue> for Decision {
    type Error = WorkflowError;

    fn try_from(value: RequestValue) -> Result<Self, Self::Error> {
        match value {
            RequestValue::Aceptado => Ok(Self::Accept),
            RequestValue::Rechazado => Ok(Self::Reject),
            RequestValue::Pendiente => Err(WorkflowError::InvalidTarget(value)),
        }
    }
}

impl Decision {
    pub fn value(self) -> RequestValue {
        match self {
            Self::Accept => RequestValue::Aceptado,
            Self::Reject => RequestValue::Rechazado,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Accept => "ACEPTADO",
            Self::Reject => "RECHAZADO",
        }
    }
}

/// Writes the caller must apply to linked entities after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    ProgramExclusion {
        program_id: i32,
        excluded: bool,
    },
    OpportunityStage {
        opportunity_id: i32,
        stage: Option<String>,
    },
    /// Puts back the stage and enrollment date an add-student request replaced.
    OpportunityRestore {
        opportunity_id: i32,
        stage: Option<String>,
        enrollment_date: Option<NaiveDate>,
    },
    OpportunitySoftDelete {
        opportunity_id: i32,
        deleted: bool,
    },
    OpportunityAmount {
        opportunity_id: i32,
        amount: BigDecimal,
        discount: Option<BigDecimal>,
    },
    ProgramInauguration {
        program_id: i32,
        date: NaiveDate,
    },
}

#[derive(Debug, Clone)]
pub struct TransitionInput<'a> {
    pub decision: Decision,
    pub author: &'a str,
    pub comment: &'a str,
    pub counter_amount: Option<BigDecimal>,
    pub counter_date: Option<NaiveDate>,
    /// List price of the opportunity's program, used to recompute its discount.
    pub list_price: Option<&'a BigDecimal>,
    pub now: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestState {
    pub id: i32,
    pub generator_id: i32,
    pub receiver_id: i32,
    pub value: RequestValue,
    pub open: bool,
    pub comment: String,
    pub updated_at: NaiveDateTime,
    pub kind: RequestKind,
}

impl RequestState {
    /// Rebuilds the typed state from a request row and its detail link.
    pub fn from_rows(
        request: &Request,
        opportunity: Option<&OpportunityLink>,
        program: Option<&ProgramLink>,
    ) -> Result<Self, WorkflowError> {
        let negotiation = Negotiation::from_flag(request.invertida);
        let missing = || WorkflowError::LinkNotFound(request.id);

        let kind = match request.tipo {
            RequestType::ExclusionPrograma => RequestKind::ProgramExclusion {
                program_id: program.ok_or_else(missing)?.programa_id,
                negotiation,
            },
            RequestType::FechaCambiada => {
                let link = program.ok_or_else(missing)?;
                RequestKind::DateChange {
                    program_id: link.programa_id,
                    dates: Offer {
                        proposed: link.fecha_inauguracion_propuesta,
                        objected: link.fecha_objetada,
                    },
                }
            }
            RequestType::AgregarAlumno => {
                let link = opportunity.ok_or_else(missing)?;
                RequestKind::AddStudent {
                    opportunity_id: link.oportunidad_id,
                    negotiation,
                    previous_stage: link.etapa_anterior.clone(),
                    previous_enrollment: link.fecha_matricula_anterior,
                }
            }
            RequestType::EliminacionBecado => RequestKind::ScholarshipRemoval {
                opportunity_id: opportunity.ok_or_else(missing)?.oportunidad_id,
                negotiation,
            },
            RequestType::EdicionAlumno => {
                let link = opportunity.ok_or_else(missing)?;
                RequestKind::StudentEdit {
                    opportunity_id: link.oportunidad_id,
                    amounts: Offer {
                        proposed: link.monto_propuesto.clone(),
                        objected: link.monto_objetado.clone(),
                    },
                }
            }
            RequestType::AprobacionJp => RequestKind::Approval(ApprovalLevel::ProductManager),
            RequestType::AprobacionComercial => RequestKind::Approval(ApprovalLevel::Commercial),
            RequestType::AprobacionDaf => RequestKind::Approval(ApprovalLevel::Finance),
        };

        Ok(Self {
            id: request.id,
            generator_id: request.generador_id,
            receiver_id: request.receptor_id,
            value: request.valor,
            open: request.abierta,
            comment: request.comentario.clone(),
            updated_at: request.created_at,
            kind,
        })
    }

    pub fn is_inverted(&self) -> bool {
        self.kind.negotiation().is_some_and(Negotiation::is_inverted)
    }

    /// Only the party currently holding the request may answer it.
    pub fn ensure_can_act(&self, user_id: i32, is_admin: bool) -> Result<(), WorkflowError> {
        if is_admin || user_id == self.receiver_id {
            Ok(())
        } else {
            Err(WorkflowError::NotReceiver(self.id))
        }
    }

    /// Applies one accept/reject decision and returns the linked-entity writes.
    pub fn transition(&mut self, input: &TransitionInput<'_>) -> Result<Vec<Effect>, WorkflowError> {
        if !self.open && !self.kind.is_approval() {
            return Err(WorkflowError::Closed(self.id));
        }

        let effects = match (&mut self.kind, input.decision) {
            (RequestKind::Approval(_), Decision::Accept) => Vec::new(),
            (RequestKind::Approval(_), Decision::Reject) => {
                self.open = true;
                Vec::new()
            }

            (RequestKind::ProgramExclusion { program_id, negotiation }, Decision::Accept) => {
                vec![Effect::ProgramExclusion {
                    program_id: *program_id,
                    excluded: !negotiation.is_inverted(),
                }]
            }
            (
                RequestKind::AddStudent {
                    opportunity_id,
                    negotiation,
                    previous_stage,
                    previous_enrollment,
                },
                Decision::Accept,
            ) => match negotiation {
                Negotiation::Forward => vec![Effect::OpportunityStage {
                    opportunity_id: *opportunity_id,
                    stage: Some(STAGE_ADDED.to_string()),
                }],
                Negotiation::Inverted => vec![Effect::OpportunityRestore {
                    opportunity_id: *opportunity_id,
                    stage: previous_stage.clone(),
                    enrollment_date: *previous_enrollment,
                }],
            },
            (RequestKind::ScholarshipRemoval { opportunity_id, negotiation }, Decision::Accept) => {
                vec![Effect::OpportunitySoftDelete {
                    opportunity_id: *opportunity_id,
                    deleted: !negotiation.is_inverted(),
                }]
            }
            (
                RequestKind::ProgramExclusion { negotiation, .. }
                | RequestKind::AddStudent { negotiation, .. }
                | RequestKind::ScholarshipRemoval { negotiation, .. },
                Decision::Reject,
            ) => {
                *negotiation = negotiation.flip();
                std::mem::swap(&mut self.generator_id, &mut self.receiver_id);
                Vec::new()
            }

            (RequestKind::StudentEdit { opportunity_id, amounts }, Decision::Accept) => {
                let amount = amounts
                    .latest()
                    .cloned()
                    .ok_or(WorkflowError::MissingField("monto"))?;
                let discount = discount_ratio(input.list_price, &amount);
                vec![Effect::OpportunityAmount {
                    opportunity_id: *opportunity_id,
                    amount,
                    discount,
                }]
            }
            (RequestKind::StudentEdit { amounts, .. }, Decision::Reject) => {
                amounts.counter(input.counter_amount.clone());
                std::mem::swap(&mut self.generator_id, &mut self.receiver_id);
                Vec::new()
            }

            (RequestKind::DateChange { program_id, dates }, Decision::Accept) => {
                let date = *dates
                    .latest()
                    .ok_or(WorkflowError::MissingField("fecha"))?;
                vec![Effect::ProgramInauguration {
                    program_id: *program_id,
                    date,
                }]
            }
            (RequestKind::DateChange { dates, .. }, Decision::Reject) => {
                dates.counter(input.counter_date);
                std::mem::swap(&mut self.generator_id, &mut self.receiver_id);
                Vec::new()
            }
        };

        let entry = comment_entry(input.now, input.author, input.decision.label(), input.comment);
        self.comment = if self.kind.is_approval() {
            prepend_comment(&self.comment, &entry)
        } else {
            append_comment(&self.comment, &entry)
        };
        self.value = input.decision.value();
        self.updated_at = input.now;

        Ok(effects)
    }
}

pub fn comment_entry(now: NaiveDateTime, author: &str, label: &str, text: &str) -> String {
    let stamp = now.format("%d-%m-%Y %H:%M");
    let text = text.trim();
    if text.is_empty() {
        format!("[{stamp}] {author} ({label})")
    } else {
        format!("[{stamp}] {author} ({label}): {text}")
    }
}

pub fn append_comment(history: &str, entry: &str) -> String {
    if history.is_empty() {
        entry.to_string()
    } else {
        format!("{history}\n{entry}")
    }
}

pub fn prepend_comment(history: &str, entry: &str) -> String {
    if history.is_empty() {
        entry.to_string()
    } else {
        format!("{entry}\n{history}")
    }
}

/// Names resolved at write time for the audit snapshot.
#[derive(Debug, Clone, Default)]
pub struct AuditNames {
    pub generator: Option<String>,
    pub receiver: Option<String>,
    pub program: Option<String>,
    pub opportunity: Option<String>,
}

/// JSON body of an audit log entry.
pub fn audit_snapshot(state: &RequestState, names: &AuditNames, event: &str) -> Value {
    let or_user = |n: &Option<String>| n.clone().unwrap_or_else(|| UNKNOWN_USER.to_string());
    let or_dash = |n: &Option<String>| n.clone().unwrap_or_else(|| UNKNOWN_ENTITY.to_string());

    let mut body = json!({
        "evento": event,
        "generador": or_user(&names.generator),
        "receptor": or_user(&names.receiver),
        "comentario": state.comment,
        "valor": state.value,
        "abierta": state.open,
        "invertida": state.is_inverted(),
    });
    let extra = match &state.kind {
        RequestKind::ProgramExclusion { .. } => json!({ "programa": or_dash(&names.program) }),
        RequestKind::DateChange { dates, .. } => json!({
            "programa": or_dash(&names.program),
            "fecha_propuesta": dates.proposed,
            "fecha_objetada": dates.objected,
        }),
        RequestKind::AddStudent { .. } | RequestKind::ScholarshipRemoval { .. } => {
            json!({ "oportunidad": or_dash(&names.opportunity) })
        }
        RequestKind::StudentEdit { amounts, .. } => json!({
            "oportunidad": or_dash(&names.opportunity),
            "monto_propuesto": amounts.proposed.as_ref().map(ToString::to_string),
            "monto_objetado": amounts.objected.as_ref().map(ToString::to_string),
        }),
        RequestKind::Approval(_) => Value::Null,
    };
    if let (Some(body), Value::Object(extra)) = (body.as_object_mut(), extra) {
        body.extend(extra);
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::str::FromStr;

    const JP: i32 = 10;
    const DAF: i32 = 1;

    fn at(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn state(kind: RequestKind) -> RequestState {
        RequestState {
            id: 7,
            generator_id: JP,
            receiver_id: DAF,
            value: RequestValue::Pendiente,
            open: true,
            comment: String::new(),
            updated_at: at(8),
            kind,
        }
    }

    fn input<'a>(decision: Decision) -> TransitionInput<'a> {
        TransitionInput {
            decision,
            author: "Ana",
            comment: "ok",
            counter_amount: None,
            counter_date: None,
            list_price: None,
            now: at(9),
        }
    }

    #[test]
    fn pending_is_not_a_valid_target() {
        assert_eq!(
            Decision::try_from(RequestValue::Pendiente),
            Err(WorkflowError::InvalidTarget(RequestValue::Pendiente))
        );
    }

    #[test]
    fn exclusion_accept_forward_then_inverted() {
        let mut s = state(RequestKind::ProgramExclusion {
            program_id: 3,
            negotiation: Negotiation::Forward,
        });
        let effects = s.transition(&input(Decision::Accept)).unwrap();
        assert_eq!(effects, vec![Effect::ProgramExclusion { program_id: 3, excluded: true }]);
        assert_eq!(s.value, RequestValue::Aceptado);
        assert!(s.open);

        s.transition(&input(Decision::Reject)).unwrap();
        assert!(s.is_inverted());
        let effects = s.transition(&input(Decision::Accept)).unwrap();
        assert_eq!(effects, vec![Effect::ProgramExclusion { program_id: 3, excluded: false }]);
    }

    #[test]
    fn reject_swaps_roles_and_flips_once() {
        let mut s = state(RequestKind::ScholarshipRemoval {
            opportunity_id: 4,
            negotiation: Negotiation::Forward,
        });
        for round in 1..=4 {
            let (g, r, inv) = (s.generator_id, s.receiver_id, s.is_inverted());
            let effects = s.transition(&input(Decision::Reject)).unwrap();
            assert!(effects.is_empty(), "rejecting must not touch the opportunity");
            assert_eq!((s.generator_id, s.receiver_id), (r, g), "round {round}");
            assert_eq!(s.is_inverted(), !inv);
            assert_eq!(s.value, RequestValue::Rechazado);
            assert!(s.open);
        }
    }

    #[test]
    fn scholarship_removal_soft_deletes_and_restores() {
        let mut s = state(RequestKind::ScholarshipRemoval {
            opportunity_id: 4,
            negotiation: Negotiation::Forward,
        });
        assert_eq!(
            s.transition(&input(Decision::Accept)).unwrap(),
            vec![Effect::OpportunitySoftDelete { opportunity_id: 4, deleted: true }]
        );
        s.transition(&input(Decision::Reject)).unwrap();
        assert_eq!(
            s.transition(&input(Decision::Accept)).unwrap(),
            vec![Effect::OpportunitySoftDelete { opportunity_id: 4, deleted: false }]
        );
    }

    #[test]
    fn add_student_inverted_restores_previous_stage_and_date() {
        let enrolled = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let mut s = state(RequestKind::AddStudent {
            opportunity_id: 9,
            negotiation: Negotiation::Forward,
            previous_stage: Some("MATRICULADO".into()),
            previous_enrollment: Some(enrolled),
        });
        assert_eq!(
            s.clone().transition(&input(Decision::Accept)).unwrap(),
            vec![Effect::OpportunityStage {
                opportunity_id: 9,
                stage: Some(STAGE_ADDED.into())
            }]
        );

        s.transition(&input(Decision::Reject)).unwrap();
        assert_eq!(
            s.transition(&input(Decision::Accept)).unwrap(),
            vec![Effect::OpportunityRestore {
                opportunity_id: 9,
                stage: Some("MATRICULADO".into()),
                enrollment_date: Some(enrolled),
            }]
        );
    }

    #[test]
    fn student_edit_adopts_latest_amount_and_recomputes_discount() {
        let mut s = state(RequestKind::StudentEdit {
            opportunity_id: 5,
            amounts: Offer::opening(dec("900")),
        });
        let mut reject = input(Decision::Reject);
        reject.counter_amount = Some(dec("800"));
        s.transition(&reject).unwrap();
        assert_eq!((s.generator_id, s.receiver_id), (DAF, JP));
        match &s.kind {
            RequestKind::StudentEdit { amounts, .. } => {
                assert_eq!(amounts.proposed, Some(dec("800")));
                assert_eq!(amounts.objected, Some(dec("900")));
            }
            other => panic!("unexpected kind {other:?}"),
        }

        let price = dec("1000");
        let mut accept = input(Decision::Accept);
        accept.list_price = Some(&price);
        let effects = s.transition(&accept).unwrap();
        assert_eq!(
            effects,
            vec![Effect::OpportunityAmount {
                opportunity_id: 5,
                amount: dec("800"),
                discount: Some(dec("0.2")),
            }]
        );
    }

    #[test]
    fn plain_reject_rotates_amounts() {
        let mut offer = Offer {
            proposed: Some(1),
            objected: Some(2),
        };
        offer.counter(None);
        assert_eq!((offer.proposed, offer.objected), (Some(2), Some(1)));
    }

    #[test]
    fn date_change_accepts_counter_date() {
        let original = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
        let counter = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        let mut s = state(RequestKind::DateChange {
            program_id: 2,
            dates: Offer::opening(original),
        });
        let mut reject = input(Decision::Reject);
        reject.counter_date = Some(counter);
        s.transition(&reject).unwrap();
        let effects = s.transition(&input(Decision::Accept)).unwrap();
        assert_eq!(effects, vec![Effect::ProgramInauguration { program_id: 2, date: counter }]);
    }

    #[test]
    fn approval_reject_reopens_and_prepends() {
        let mut s = state(RequestKind::Approval(ApprovalLevel::ProductManager));
        s.open = false;
        s.comment = "[01-03-2024 10:00] Luis (ACEPTADO)".into();
        s.transition(&input(Decision::Reject)).unwrap();
        assert!(s.open);
        assert_eq!(s.value, RequestValue::Rechazado);
        assert!(s.comment.starts_with("[05-03-2024 09:00] Ana (RECHAZADO): ok\n"));
        assert_eq!((s.generator_id, s.receiver_id), (JP, DAF));
    }

    #[test]
    fn ping_pong_types_refuse_closed_requests() {
        let mut s = state(RequestKind::ProgramExclusion {
            program_id: 1,
            negotiation: Negotiation::Forward,
        });
        s.open = false;
        assert_eq!(
            s.transition(&input(Decision::Accept)),
            Err(WorkflowError::Closed(7))
        );
    }

    #[test]
    fn comments_append_as_transcript() {
        let mut s = state(RequestKind::ScholarshipRemoval {
            opportunity_id: 1,
            negotiation: Negotiation::Forward,
        });
        s.transition(&input(Decision::Reject)).unwrap();
        let mut second = input(Decision::Accept);
        second.comment = "";
        second.now = at(11);
        s.transition(&second).unwrap();
        assert_eq!(
            s.comment,
            "[05-03-2024 09:00] Ana (RECHAZADO): ok\n[05-03-2024 11:00] Ana (ACEPTADO)"
        );
        assert_eq!(s.updated_at, at(11));
    }

    #[test]
    fn only_receiver_or_admin_can_act() {
        let s = state(RequestKind::Approval(ApprovalLevel::Finance));
        assert!(s.ensure_can_act(DAF, false).is_ok());
        assert!(s.ensure_can_act(99, true).is_ok());
        assert_eq!(s.ensure_can_act(JP, false), Err(WorkflowError::NotReceiver(7)));
    }

    #[test]
    fn missing_link_is_reported() {
        let row = Request {
            id: 3,
            creador_id: JP,
            generador_id: JP,
            receptor_id: DAF,
            propuesta_id: Some(1),
            tipo: RequestType::EdicionAlumno,
            valor: RequestValue::Pendiente,
            abierta: true,
            comentario: String::new(),
            invertida: false,
            version: 0,
            created_at: at(8),
        };
        assert_eq!(
            RequestState::from_rows(&row, None, None),
            Err(WorkflowError::LinkNotFound(3))
        );
    }

    #[test]
    fn snapshot_uses_placeholders() {
        let s = state(RequestKind::StudentEdit {
            opportunity_id: 5,
            amounts: Offer::opening(dec("900")),
        });
        let body = audit_snapshot(&s, &AuditNames::default(), "CREACION");
        assert_eq!(body["generador"], UNKNOWN_USER);
        assert_eq!(body["oportunidad"], UNKNOWN_ENTITY);
        assert_eq!(body["monto_propuesto"], "900");
        assert_eq!(body["evento"], "CREACION");
    }
}
