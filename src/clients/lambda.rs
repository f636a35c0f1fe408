use reqwest::Client;
use serde_json::json;

use super::check_status;
use crate::db::models::user::VacationUpdate;
use crate::db::models::vendor::{Vendor, VendorListing};
use crate::utils::error::AppResult;

/// Client for the vendor-listing and vacation-update Lambda endpoints.
#[derive(Clone, Debug)]
pub struct LambdaClient {
    http: Client,
    vendors_url: String,
    vacations_url: String,
}

impl LambdaClient {
    pub fn new(http: Client, vendors_url: &str, vacations_url: &str) -> Self {
        Self {
            http,
            vendors_url: vendors_url.to_string(),
            vacations_url: vacations_url.to_string(),
        }
    }

    async fn fetch_vendors(&self) -> AppResult<Vec<Vendor>> {
        let response = self.http.get(&self.vendors_url).send().await?;
        Ok(check_status("vendors-lambda", response).await?.json().await?)
    }

    /// Never fails: an upstream error yields an empty, `degraded` listing.
    pub async fn list_vendors(&self) -> VendorListing {
        match self.fetch_vendors().await {
            Ok(vendedores) => VendorListing {
                vendedores,
                degraded: false,
            },
            Err(err) => {
                tracing::warn!(error = %err, "vendor listing unavailable, serving empty list");
                VendorListing {
                    vendedores: Vec::new(),
                    degraded: true,
                }
            }
        }
    }

    pub async fn update_vacations(&self, user_id: i32, update: &VacationUpdate) -> AppResult<()> {
        let response = self
            .http
            .post(&self.vacations_url)
            .json(&json!({
                "usuario_id": user_id,
                "periodos": update.periodos,
                "dias_pendientes": update.dias_pendientes,
            }))
            .send()
            .await?;
        check_status("vacations-lambda", response).await?;
        Ok(())
    }
}
