//! Gate for advancing a proposal one stage.

use crate::db::models::proposal::ProposalStage;
use crate::db::models::request::{RequestType, RequestValue};
use crate::db::models::user::UserRole;
use crate::utils::error::AppError;

/// An open request opened by the user asking for the advance. Rejections swap
/// generator and receiver, so these are selected by author, not by holder.
#[derive(Debug, Clone, Copy)]
pub struct OwnRequest {
    pub tipo: RequestType,
    pub valor: RequestValue,
}

/// A finance supervisor with requests on the proposal that are not accepted.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FinanceBlocker {
    pub nombre: String,
    pub pendientes: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceDecision {
    Advance {
        to: ProposalStage,
        /// Force-close the requester's own open requests.
        close_own: bool,
    },
    /// Not advanced; the message explains what blocks it.
    Refused(String),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StageError {
    #[error("La propuesta está en estado terminal {0:?} y no puede avanzar")]
    Terminal(ProposalStage),
}

impl From<StageError> for AppError {
    fn from(err: StageError) -> Self {
        AppError::Conflict(err.to_string())
    }
}

pub fn evaluate_advance(
    current: ProposalStage,
    requester_role: UserRole,
    own_open: &[OwnRequest],
    finance_blockers: &[FinanceBlocker],
) -> Result<AdvanceDecision, StageError> {
    let to = current.next().ok_or(StageError::Terminal(current))?;

    let is_product_manager = requester_role == UserRole::ProductManager;
    if is_product_manager {
        let unaccepted = own_open
            .iter()
            .filter(|r| r.tipo != RequestType::AprobacionJp)
            .filter(|r| r.valor != RequestValue::Aceptado)
            .count();
        if unaccepted > 0 {
            return Ok(AdvanceDecision::Refused(format!(
                "Tienes {unaccepted} solicitudes abiertas que aún no han sido aceptadas"
            )));
        }
    }

    if current == ProposalStage::Preconciliada {
        if let Some(blocker) = finance_blockers.iter().find(|b| b.pendientes > 0) {
            return Ok(AdvanceDecision::Refused(format!(
                "El usuario {} tiene {} solicitudes sin aceptar en esta propuesta",
                blocker.nombre, blocker.pendientes
            )));
        }
    }

    Ok(AdvanceDecision::Advance {
        to,
        close_own: is_product_manager,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn own(tipo: RequestType, valor: RequestValue) -> OwnRequest {
        OwnRequest { tipo, valor }
    }

    #[test]
    fn advances_one_step() {
        let decision =
            evaluate_advance(ProposalStage::Creada, UserRole::FinanceSupervisor, &[], &[]).unwrap();
        assert_eq!(
            decision,
            AdvanceDecision::Advance { to: ProposalStage::RevisionJp, close_own: false }
        );
    }

    #[test]
    fn product_manager_needs_own_requests_accepted() {
        let requests = [
            own(RequestType::ExclusionPrograma, RequestValue::Aceptado),
            own(RequestType::EdicionAlumno, RequestValue::Rechazado),
            own(RequestType::AprobacionJp, RequestValue::Pendiente),
        ];
        let decision =
            evaluate_advance(ProposalStage::RevisionJp, UserRole::ProductManager, &requests, &[])
                .unwrap();
        assert!(matches!(decision, AdvanceDecision::Refused(msg) if msg.contains('1')));

        let decision = evaluate_advance(
            ProposalStage::RevisionJp,
            UserRole::ProductManager,
            &requests[..1],
            &[],
        )
        .unwrap();
        assert_eq!(
            decision,
            AdvanceDecision::Advance { to: ProposalStage::RevisionSubdireccion, close_own: true }
        );
    }

    #[test]
    fn request_sent_back_by_finance_still_blocks() {
        // Finance rejected the manager's amount edit: roles swapped, value RECHAZADO.
        let requests = [own(RequestType::EdicionAlumno, RequestValue::Rechazado)];
        let decision =
            evaluate_advance(ProposalStage::RevisionJp, UserRole::ProductManager, &requests, &[])
                .unwrap();
        assert!(matches!(decision, AdvanceDecision::Refused(_)));
    }

    #[test]
    fn jp_approvals_do_not_block() {
        let requests = [own(RequestType::AprobacionJp, RequestValue::Pendiente)];
        let decision =
            evaluate_advance(ProposalStage::Creada, UserRole::ProductManager, &requests, &[])
                .unwrap();
        assert!(matches!(decision, AdvanceDecision::Advance { .. }));
    }

    #[test]
    fn preconciliada_blocked_by_finance_user() {
        let blockers = [
            FinanceBlocker { nombre: "Marta".into(), pendientes: 0 },
            FinanceBlocker { nombre: "Pedro".into(), pendientes: 2 },
        ];
        let decision =
            evaluate_advance(ProposalStage::Preconciliada, UserRole::Admin, &[], &blockers).unwrap();
        match decision {
            AdvanceDecision::Refused(msg) => {
                assert!(msg.contains("Pedro"));
                assert!(msg.contains('2'));
            }
            other => panic!("expected refusal, got {other:?}"),
        }
    }

    #[test]
    fn finance_blockers_ignored_outside_preconciliada() {
        let blockers = [FinanceBlocker { nombre: "Pedro".into(), pendientes: 2 }];
        let decision =
            evaluate_advance(ProposalStage::RevisionSubdireccion, UserRole::Admin, &[], &blockers)
                .unwrap();
        assert_eq!(
            decision,
            AdvanceDecision::Advance { to: ProposalStage::Preconciliada, close_own: false }
        );
    }

    #[test]
    fn terminal_stages_refuse_with_error() {
        assert_eq!(
            evaluate_advance(ProposalStage::Conciliada, UserRole::Admin, &[], &[]),
            Err(StageError::Terminal(ProposalStage::Conciliada))
        );
        assert_eq!(
            evaluate_advance(ProposalStage::Cancelada, UserRole::Admin, &[], &[]),
            Err(StageError::Terminal(ProposalStage::Cancelada))
        );
    }
}
