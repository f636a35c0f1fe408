//! Validation for newly opened requests.

use crate::db::models::request::{LinkKind, NewRequest, RequestType};
use crate::workflow::negotiation::WorkflowError;

/// Entity the new request will be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreationTarget {
    Opportunity(i32),
    Program(i32),
    Proposal(i32),
}

/// Checks the fields each type requires and returns the entity to attach to.
pub fn validate_new_request(payload: &NewRequest) -> Result<CreationTarget, WorkflowError> {
    let target = match payload.tipo.link_kind() {
        LinkKind::Opportunity => payload
            .oportunidad_id
            .map(CreationTarget::Opportunity)
            .ok_or(WorkflowError::MissingField("oportunidad_id"))?,
        LinkKind::Program => payload
            .programa_id
            .map(CreationTarget::Program)
            .ok_or(WorkflowError::MissingField("programa_id"))?,
        LinkKind::None => payload
            .propuesta_id
            .map(CreationTarget::Proposal)
            .ok_or(WorkflowError::MissingField("propuesta_id"))?,
    };

    match payload.tipo {
        RequestType::EdicionAlumno if payload.monto.is_none() => {
            Err(WorkflowError::MissingField("monto"))
        }
        RequestType::FechaCambiada if payload.fecha.is_none() => {
            Err(WorkflowError::MissingField("fecha"))
        }
        _ => Ok(target),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;

    fn new_request(tipo: RequestType) -> NewRequest {
        NewRequest {
            tipo,
            oportunidad_id: None,
            programa_id: None,
            propuesta_id: None,
            comentario: "revisar".into(),
            monto: None,
            fecha: None,
        }
    }

    #[test]
    fn edit_requires_amount() {
        let mut payload = new_request(RequestType::EdicionAlumno);
        payload.oportunidad_id = Some(4);
        assert_eq!(
            validate_new_request(&payload),
            Err(WorkflowError::MissingField("monto"))
        );
        payload.monto = Some(BigDecimal::from(1200));
        assert_eq!(validate_new_request(&payload), Ok(CreationTarget::Opportunity(4)));
    }

    #[test]
    fn date_change_requires_program_and_date() {
        let payload = new_request(RequestType::FechaCambiada);
        assert_eq!(
            validate_new_request(&payload),
            Err(WorkflowError::MissingField("programa_id"))
        );
    }

    #[test]
    fn approvals_target_the_proposal() {
        let mut payload = new_request(RequestType::AprobacionComercial);
        payload.propuesta_id = Some(2);
        assert_eq!(validate_new_request(&payload), Ok(CreationTarget::Proposal(2)));
    }
}
