use std::collections::BTreeMap;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use doctor_cell::models::DoctorProfile;
use doctor_cell::services::DoctorService;
use shared_config::AppConfig;
use shared_database::SupabaseClient;
use shared_models::auth::User;

use crate::models::{AdminError, PaymentAmounts, PlatformStats, UserListQuery, UserSummary};

const USERS_TABLE: &str = "users";
const USER_COLUMNS: &str = "id,email,role,first_name,last_name,phone,is_active,created_at";
const DEFAULT_PAGE_SIZE: u32 = 50;
const MAX_PAGE_SIZE: u32 = 200;
const REVENUE_PAGE_SIZE: usize = 1000;

const ROLES: [&str; 3] = ["patient", "doctor", "admin"];
const APPOINTMENT_STATUSES: [&str; 6] = [
    "awaiting_acceptance",
    "payment_pending",
    "confirmed",
    "completed",
    "cancelled",
    "rejected",
];

pub struct AdminService {
    supabase: SupabaseClient,
    doctors: DoctorService,
}

impl AdminService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            doctors: DoctorService::new(config),
        }
    }

    // ==========================================================================
    // USERS
    // ==========================================================================

    pub async fn list_users(&self, query: &UserListQuery) -> Result<Vec<UserSummary>, AdminError> {
        let mut filters = vec![format!("select={}", USER_COLUMNS)];
        if let Some(role) = query.role {
            filters.push(format!("role=eq.{}", role));
        }
        if let Some(active) = query.is_active {
            filters.push(format!("is_active=eq.{}", active));
        }
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
        filters.push("order=created_at.desc".to_string());
        filters.push(format!("limit={}", limit));
        filters.push(format!("offset={}", query.offset.unwrap_or(0)));

        Ok(self.supabase.select(USERS_TABLE, &filters.join("&")).await?)
    }

    /// Deactivated users can no longer log in. Admins cannot deactivate
    /// themselves.
    #[instrument(skip(self, admin), fields(admin_id = %admin.id))]
    pub async fn set_user_active(
        &self,
        admin: &User,
        user_id: Uuid,
        active: bool,
    ) -> Result<UserSummary, AdminError> {
        if !active && admin.is(&user_id) {
            return Err(AdminError::ValidationError(
                "Admins cannot deactivate their own account".to_string(),
            ));
        }

        let mut rows: Vec<UserSummary> = self
            .supabase
            .update(
                USERS_TABLE,
                &format!("id=eq.{}&select={}", user_id, USER_COLUMNS),
                json!({
                    "is_active": active,
                    "updated_at": Utc::now().to_rfc3339(),
                }),
            )
            .await?;

        let user = rows.pop().ok_or_else(|| AdminError::NotFound("User".to_string()))?;
        info!("User {} active set to {}", user.id, active);
        Ok(user)
    }

    pub async fn verify_doctor(&self, user_id: Uuid, verified: bool) -> Result<DoctorProfile, AdminError> {
        Ok(self.doctors.set_verified(user_id, verified).await?)
    }

    // ==========================================================================
    // STATS
    // ==========================================================================

    pub async fn platform_stats(&self) -> Result<PlatformStats, AdminError> {
        let mut users_by_role = BTreeMap::new();
        for role in ROLES {
            let count = self.supabase.count(USERS_TABLE, &format!("role=eq.{}", role)).await?;
            users_by_role.insert(role.to_string(), count);
        }

        let mut appointments_by_status = BTreeMap::new();
        for status in APPOINTMENT_STATUSES {
            let count = self
                .supabase
                .count("appointments", &format!("status=eq.{}", status))
                .await?;
            appointments_by_status.insert(status.to_string(), count);
        }

        let (mut gross, mut refunded, mut counted) = (0.0, 0.0, 0);
        loop {
            let page: Vec<PaymentAmounts> = self
                .supabase
                .select(
                    "payments",
                    &format!(
                        "select=amount,refunded_amount&status=in.(succeeded,refunded)&order=id.asc&limit={}&offset={}",
                        REVENUE_PAGE_SIZE, counted
                    ),
                )
                .await?;
            gross += page.iter().map(|p| p.amount).sum::<f64>();
            refunded += page.iter().map(|p| p.refunded_amount).sum::<f64>();
            counted += page.len();
            if page.len() < REVENUE_PAGE_SIZE {
                break;
            }
        }
        debug!("Revenue over {} payments: gross {:.2}, refunded {:.2}", counted, gross, refunded);

        Ok(PlatformStats {
            users_by_role,
            appointments_by_status,
            revenue: round_cents(gross - refunded),
            refunded: round_cents(refunded),
            generated_at: Utc::now(),
        })
    }
}

fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}
