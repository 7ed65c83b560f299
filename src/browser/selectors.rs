//! Element locators for the wiki's rendered pages
//!
//! Everything the crawler knows about the remote page structure lives here.

use super::Locator;

/// Text shown in place of a page that does not exist
pub const PAGE_NOT_FOUND_TEXT: &str = "you want to access does not exist";

pub const PAGE_TITLE: Locator<'static> = Locator::Id("page-title");
pub const PAGE_TAGS: Locator<'static> = Locator::Css(".page-tags a");

// ===== History =====

pub const HISTORY_BUTTON: Locator<'static> = Locator::Id("history-button");
pub const REVISION_LIST: Locator<'static> = Locator::Id("revision-list");

/// Rows of the history table, newest first; the first row is the column header
pub const REVISION_ROWS: Locator<'static> =
    Locator::XPath("//*[@id=\"revision-list\"]/table/tbody/tr");

/// The "S" (view source) control inside a history row
pub const ROW_SOURCE_BUTTON: Locator<'static> = Locator::Css("a[onclick^=\"showSource\"]");

/// The revision source revealed below the history table
pub const REVISION_SOURCE: Locator<'static> = Locator::Css("#history-subarea .page-source");

/// Buttons of the history pager; the shown page has class `current`, the others `target`
pub const PAGER_BUTTONS: Locator<'static> = Locator::Css("#revision-list .pager span");
pub const PAGER_LINK: Locator<'static> = Locator::Css("a");
pub const PAGER_CURRENT_CLASS: &str = "current";
pub const PAGER_TARGET_CLASS: &str = "target";

// ===== Current page state =====

pub const EDIT_BUTTON: Locator<'static> = Locator::Id("edit-button");
pub const EDIT_TEXTAREA: Locator<'static> = Locator::Id("edit-page-textarea");
pub const EDIT_CANCEL: Locator<'static> = Locator::Id("edit-cancel-button");

pub const FILES_BUTTON: Locator<'static> = Locator::Id("files-button");
pub const ACTION_AREA: Locator<'static> = Locator::Id("action-area");

/// Download links in the attached-files table
pub const FILE_LINKS: Locator<'static> = Locator::Css("#action-area .page-files .file-name a");

// ===== Login =====

pub const LOGIN_URL: &str = "https://www.wikidot.com/default--flow/login__LoginPopupScreen";
pub const LOGIN_NAME_FIELD: Locator<'static> = Locator::Css("input[name=\"login\"]");
pub const LOGIN_PASSWORD_FIELD: Locator<'static> = Locator::Css("input[name=\"password\"]");
pub const LOGIN_SUBMIT: Locator<'static> = Locator::Css("button[type=\"submit\"]");

/// Present only for a signed-in user
pub const ACCOUNT_MENU: Locator<'static> = Locator::Id("account-topbutton");
