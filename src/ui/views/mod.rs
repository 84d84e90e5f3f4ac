mod dashboard;
mod dispatch_detail;
mod dispatch_list;
mod ledger;
mod ledger_entry;
mod login;
mod return_detail;
mod return_form;
mod return_list;

pub use dashboard::DashboardView;
pub use dispatch_detail::DispatchDetailView;
pub use dispatch_list::DispatchListView;
pub use ledger::LedgerView;
pub use ledger_entry::LedgerEntryView;
pub use login::LoginView;
pub use return_detail::ReturnDetailView;
pub use return_form::ReturnFormView;
pub use return_list::ReturnListView;
