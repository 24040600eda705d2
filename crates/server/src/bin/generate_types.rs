use ts_rs::TS;

fn main() {
    let decls = [
        db::models::user::Plan::decl(),
        db::models::user::UserRole::decl(),
        db::models::user::SubscriptionStatus::decl(),
        db::models::user::User::decl(),
        db::models::project::ProjectStatus::decl(),
        db::models::project::ProjectPlan::decl(),
        db::models::project::CreateProject::decl(),
        db::models::project::ProjectResponse::decl(),
        db::models::project_file::ProjectFile::decl(),
        db::models::payment::PaymentStatus::decl(),
        db::models::payment::Payment::decl(),
        db::models::coupon::Coupon::decl(),
        db::models::coupon::CreateCoupon::decl(),
        db::models::referral::ReferralStatus::decl(),
        db::models::referral::Referral::decl(),
        db::models::deployment::DeploymentStatus::decl(),
        db::models::deployment::Deployment::decl(),
        db::models::admin_stats::AdminStats::decl(),
        services::services::account::SignupRequest::decl(),
        services::services::usage::UsageCheck::decl(),
        services::services::project_builder::BuildOutcome::decl(),
        services::services::billing::PaymentInitialization::decl(),
        services::services::billing::PaymentVerification::decl(),
        services::services::referral::ReferralSummary::decl(),
        server::routes::projects::ProjectDetail::decl(),
        server::routes::projects::GeneratePlanRequest::decl(),
        server::routes::payments::InitializePaymentRequest::decl(),
        server::routes::admin::AdminOverview::decl(),
        server::routes::admin::SetCouponActive::decl(),
        utils::response::ApiResponse::<()>::decl(),
    ];

    println!("// This file was generated by `generate_types`. Do not edit.\n");
    for decl in decls {
        println!("export {decl}\n");
    }
}
