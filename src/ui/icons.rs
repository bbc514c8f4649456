//! Shared UI icons.

use console::Emoji;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "[SKIP]");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[WARN]");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "*");

// Job indicators
pub static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");
pub static PACKAGE: Emoji<'_, '_> = Emoji("📦 ", "[ITEM]");
pub static CLEANUP: Emoji<'_, '_> = Emoji("🧹 ", "[CLEAN]");
pub static PROGRESS: Emoji<'_, '_> = Emoji("📊 ", "[PROG]");
pub static RESUME: Emoji<'_, '_> = Emoji("🔄 ", "[RESUME]");
