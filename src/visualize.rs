//! Plain-text rendering of the wallet hierarchy.
//!
//! Output depends only on ledger state, so the same ledger always renders to
//! the same string.

use crate::fractal::FractalPosition;
use crate::ledger::Ledger;
use crate::transaction::Amount;
use crate::wallet::{WalletRecord, WalletRole};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table};
use std::fmt::Write;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    pub show_balances: bool,
}

impl RenderOptions {
    pub fn with_balances() -> Self {
        RenderOptions { show_balances: true }
    }
}

impl Ledger {
    pub fn visualize_ledger(&self, options: &RenderOptions) -> String {
        Visualizer::new(self, *options).render()
    }
}

struct Visualizer<'a> {
    ledger: &'a Ledger,
    options: RenderOptions,
}

impl<'a> Visualizer<'a> {
    fn new(ledger: &'a Ledger, options: RenderOptions) -> Self {
        Visualizer { ledger, options }
    }

    fn render(&self) -> String {
        let addressing = self.ledger.addressing();
        let registry = self.ledger.registry();
        let mut out = String::new();

        let _ = writeln!(
            out,
            "Sierpinski ledger: {} transactions, {} wallets (branching factor {}, max depth {})",
            self.ledger.len(),
            registry.len(),
            addressing.branching_factor,
            addressing.max_depth
        );
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", self.level_table());
        let _ = writeln!(out);
        let _ = writeln!(out, "Hierarchy");

        if registry.is_empty() {
            let _ = writeln!(out, "  (no wallets)");
        } else {
            for wallet in registry.by_position() {
                let detached = addressing
                    .parent(wallet.position())
                    .map_or(true, |parent| !registry.is_populated(parent));
                if detached {
                    self.render_subtree(&mut out, wallet, "", None);
                }
            }
        }

        let unregistered = self
            .ledger
            .balances()
            .filter(|(wallet, _)| !registry.contains(wallet))
            .count();
        let _ = writeln!(out);
        let _ = write!(out, "Unregistered addresses in log: {}", unregistered);
        out
    }

    fn level_table(&self) -> Table {
        let addressing = self.ledger.addressing();
        let registry = self.ledger.registry();
        let deepest = registry.by_position().map(|w| w.level).max().unwrap_or(0);

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Disabled)
            .set_header(vec!["Level", "Capacity", "Populated", "Balance"]);

        for level in 0..=deepest {
            let capacity = addressing
                .capacity(level)
                .map_or_else(|| "-".to_string(), |c| c.to_string());
            let total = registry
                .by_position()
                .filter(|w| w.level == level)
                .fold(Amount::ZERO, |acc, w| {
                    acc.saturating_add(self.ledger.balance(&w.address))
                });
            table.add_row(vec![
                Cell::new(level).set_alignment(CellAlignment::Right),
                Cell::new(capacity).set_alignment(CellAlignment::Right),
                Cell::new(registry.populated_at(level)).set_alignment(CellAlignment::Right),
                Cell::new(total).set_alignment(CellAlignment::Right),
            ]);
        }
        table
    }

    /// `branch` is `Some(is_last)` for every node below a detached root.
    fn render_subtree(&self, out: &mut String, wallet: &WalletRecord, prefix: &str, branch: Option<bool>) {
        let connector = match branch {
            None => "△ ",
            Some(true) => "└── ",
            Some(false) => "├── ",
        };
        let _ = write!(out, "{}{}{} {}", prefix, connector, wallet.address, wallet.position());
        if wallet.role == WalletRole::Founder {
            let _ = write!(out, " [founder]");
        }
        if self.options.show_balances {
            let _ = write!(out, " balance={}", self.ledger.balance(&wallet.address));
        }
        let _ = writeln!(out);

        let children = self.children(wallet.position());
        let child_prefix = match branch {
            None => prefix.to_string(),
            Some(true) => format!("{}    ", prefix),
            Some(false) => format!("{}│   ", prefix),
        };
        let count = children.len();
        for (i, child) in children.into_iter().enumerate() {
            self.render_subtree(out, child, &child_prefix, Some(i + 1 == count));
        }
    }

    fn children(&self, position: FractalPosition) -> Vec<&'a WalletRecord> {
        let addressing = self.ledger.addressing();
        let registry = self.ledger.registry();
        let level = position.level + 1;
        if level > addressing.max_depth {
            return Vec::new();
        }
        let branching = u64::from(addressing.branching_factor);
        let first = position.index.saturating_mul(branching);
        (first..first.saturating_add(branching))
            .filter_map(|index| registry.at(FractalPosition::new(level, index)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onboarding::OnboardingPolicy;

    #[test]
    fn test_empty_ledger() {
        let rendered = Ledger::default().visualize_ledger(&RenderOptions::default());
        assert!(rendered.contains("0 transactions, 0 wallets"));
        assert!(rendered.contains("(no wallets)"));
        assert!(rendered.ends_with("Unregistered addresses in log: 0"));
    }

    #[test]
    fn test_tree_is_deterministic_and_ordered() {
        let mut ledger = Ledger::default();
        let policy = OnboardingPolicy::default();
        let founder = ledger.founder_onboarding(policy).unwrap();
        let members: Vec<_> = (0..4)
            .map(|_| ledger.standard_onboarding(policy, &founder.key).unwrap())
            .collect();

        let first = ledger.visualize_ledger(&RenderOptions::default());
        assert_eq!(first, ledger.visualize_ledger(&RenderOptions::default()));

        let root_line = first.find(&founder.foundational_wallet).unwrap();
        let mut previous = root_line;
        for member in &members[..3] {
            let at = first.find(&member.wallet).unwrap();
            assert!(at > previous);
            previous = at;
        }
        assert!(first.contains("[founder]"));
        assert!(!first.contains("balance="));
        // (2, 0) hangs off (1, 0), so it renders before (1, 1).
        assert!(first.find(&members[3].wallet).unwrap() < first.find(&members[1].wallet).unwrap());
    }

    #[test]
    fn test_balances_and_unregistered_addresses() {
        let mut ledger = Ledger::default();
        let policy = OnboardingPolicy::default();
        let founder = ledger.founder_onboarding(policy).unwrap();
        let member = ledger.standard_onboarding(policy, &founder.key).unwrap();

        let stranger = ledger.addressing().encode(3, 7).unwrap();
        let tx = ledger
            .factory()
            .create(&member.wallet, &stranger, Amount::from_num(10))
            .unwrap();
        let tx = ledger.sign(&tx, &member.key).unwrap();
        ledger.insert(vec![tx]).unwrap();

        let rendered = ledger.visualize_ledger(&RenderOptions::with_balances());
        assert!(rendered.contains(&format!("{} (1, 0) balance=90", member.wallet)));
        assert!(rendered.ends_with("Unregistered addresses in log: 1"));
        assert!(!rendered.contains(&stranger));
    }
}
