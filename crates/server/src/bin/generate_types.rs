use std::{env, fs, path::PathBuf};

use ts_rs::TS;

const DEFAULT_OUTPUT: &str = "shared/types.ts";

fn generate_types_content() -> String {
    let header = "// This file was generated by `generate_types`. Do not edit it by hand.\n\n";

    let decls = [
        db::models::profile::Role::decl(),
        db::models::profile::Profile::decl(),
        db::models::agent_application::ApplicationStatus::decl(),
        db::models::agent_application::PaymentStatus::decl(),
        db::models::agent_application::AgentApplication::decl(),
        db::models::agent_application::CreateAgentApplication::decl(),
        db::models::agent_application::UpdateAgentApplication::decl(),
        db::models::carrier::Carrier::decl(),
        db::models::carrier::CreateCarrier::decl(),
        db::models::carrier_commission_rate::CarrierCommissionRate::decl(),
        db::models::carrier_commission_rate::CreateCommissionRate::decl(),
        db::models::carrier_commission_rate::UpdateCommissionRate::decl(),
        db::models::carrier_commission_rate::CommissionRateFilter::decl(),
        db::models::attachment::AttachmentType::decl(),
        db::models::attachment::Attachment::decl(),
        db::models::attachment::AttachmentDetails::decl(),
        db::models::attachment::AttachmentWithDetails::decl(),
        db::models::calendar_event::CalendarEvent::decl(),
        db::models::calendar_event::CreateCalendarEvent::decl(),
        db::models::calendar_event::UpdateCalendarEvent::decl(),
        services::services::roles::RoleSource::decl(),
        services::services::roles::ProfileAction::decl(),
        services::services::roles::CookieUpdate::decl(),
        services::services::roles::Navigation::decl(),
        services::services::roles::RoleResolution::decl(),
        services::services::access::ResolvedUser::decl(),
        services::services::applications::Financials::decl(),
        services::services::extract::Field::decl(),
        services::services::extract::ExtractedFields::decl(),
        services::services::extract::Extraction::decl(),
        services::services::attachments::CreateAttachment::decl(),
        services::services::attachments::CreatedAttachment::decl(),
        services::services::attachments::AttachmentWithUrl::decl(),
        services::services::commission_rates::RateLookup::decl(),
        services::services::profiles::UpdateProfileRole::decl(),
        services::services::profiles::UpdateProfileOrganization::decl(),
        services::services::dashboard::ApplicationTotals::decl(),
        services::services::dashboard::DashboardSummary::decl(),
        server::routes::auth::DevLoginRequest::decl(),
        server::routes::auth::DevLoginResponse::decl(),
        server::routes::session::SessionRole::decl(),
        server::routes::session::SetTestRole::decl(),
        server::routes::session::SetManagerView::decl(),
        server::routes::attachments::FileUpload::decl(),
        server::routes::attachments::UploadAttachmentRequest::decl(),
        server::routes::attachments::ParseRequest::decl(),
    ];

    let body = decls
        .into_iter()
        .map(|decl| {
            let trimmed = decl.trim_start();
            if trimmed.starts_with("export") {
                trimmed.to_string()
            } else {
                format!("export {trimmed}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("{header}{body}\n")
}

fn main() -> anyhow::Result<()> {
    let check_mode = env::args().any(|arg| arg == "--check");
    let output = env::args()
        .skip(1)
        .find(|arg| !arg.starts_with("--"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));

    let generated = generate_types_content();

    if check_mode {
        let current = fs::read_to_string(&output).unwrap_or_default();
        if current == generated {
            println!("{} is up to date", output.display());
            return Ok(());
        }
        anyhow::bail!("{} is out of date; rerun generate_types", output.display());
    }

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&output, generated)?;
    println!("wrote {}", output.display());
    Ok(())
}
