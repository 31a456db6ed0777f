//! Built-in scrape target catalogue
//!
//! The back office exposes one listing endpoint parameterized by a filter id,
//! plus a date-ranged weekly review. Section labels, column schemas, and page
//! windows are fixed here per target; a run never discovers structure
//! dynamically.

use crate::domain::section::{ColumnSpec, SectionSpec, TargetKind, TargetSpec};
use crate::infrastructure::config::backoffice;

/// Name of the one bucketed target.
pub const WEEKLY_REVIEW_TARGET: &str = "weekly_review";

/// Sub-fields packed into a `Vehicle` cell, in display order.
const VEHICLE_SUB_FIELDS: &[&str] = &["Plate", "Model", "Manufacturing_date", "Details", "Country"];

/// Metric columns of the weekly review table, in display order.
const WEEKLY_METRICS: &[&str] = &[
    "New",
    "Scrap",
    "Quotation",
    "Consignment",
    "Sales",
    "Coe Renewal",
    "Loan Paperwork",
    "Consignment Purchase",
    "Dealer Purchase",
    "Floor",
    "Purchases",
    "Insurances",
    "Total",
];

pub fn builtin_targets() -> Vec<TargetSpec> {
    vec![
        new_enquiries(),
        scrap_export(),
        quotation(),
        consignment(),
        sold(),
        void_enquiries(),
        weekly_review(),
    ]
}

fn vehicle() -> ColumnSpec {
    ColumnSpec::composite("Vehicle", VEHICLE_SUB_FIELDS)
}

/// Enquiry-style section: seller, vehicle, assigned agent, one date column,
/// and the record link.
fn enquiry_columns(date_column: &'static str) -> Vec<ColumnSpec> {
    vec![
        ColumnSpec::stripped("Seller"),
        vehicle(),
        ColumnSpec::first_line("Agent"),
        ColumnSpec::text(date_column),
        ColumnSpec::link("Link"),
    ]
}

/// Offer-style section: seller, vehicle, offer counters, one date column, and
/// the record link. The scrap export view renders seller names without the
/// trailing break the other views carry.
fn offer_columns(date_column: &'static str, strip_seller: bool) -> Vec<ColumnSpec> {
    let seller = if strip_seller {
        ColumnSpec::stripped("Seller")
    } else {
        ColumnSpec::text("Seller")
    };
    vec![
        seller,
        vehicle(),
        ColumnSpec::text("No of Offers"),
        ColumnSpec::text("Highest Offer"),
        ColumnSpec::text(date_column),
        ColumnSpec::link("Link"),
    ]
}

fn new_enquiries() -> TargetSpec {
    TargetSpec {
        name: "new",
        kind: TargetKind::Listing {
            filter: 1,
            pages: 1..=1,
        },
        sections: vec![
            SectionSpec::heading("New", enquiry_columns("Created Date")),
            SectionSpec::heading("Followup", enquiry_columns("Follow-Up Date")),
        ],
    }
}

fn scrap_export() -> TargetSpec {
    TargetSpec {
        name: "scrap_export",
        kind: TargetKind::Listing {
            filter: 2,
            pages: 1..=2,
        },
        sections: vec![
            SectionSpec::heading("Active New", offer_columns("Closing Date", false)),
            SectionSpec::heading("Active Requote", offer_columns("Closing Date", false)),
            SectionSpec::heading("Followup", offer_columns("Follow-Up Date", false)),
            SectionSpec::heading("Appointment", offer_columns("Appointment Date", false)),
        ],
    }
}

fn quotation() -> TargetSpec {
    TargetSpec {
        name: "quotation",
        kind: TargetKind::Listing {
            filter: 3,
            pages: 1..=1,
        },
        sections: vec![
            SectionSpec::heading("Active New", offer_columns("Closing Date", true)),
            SectionSpec::heading("Active Requote", offer_columns("Closing Date", true)),
            SectionSpec::heading("Followup", offer_columns("Follow-Up Date", true)),
            SectionSpec::heading("Pending Agreement", offer_columns("Follow-Up Date", true)),
            SectionSpec::heading("Appointment", offer_columns("Appointment Date", true)),
        ],
    }
}

fn consignment() -> TargetSpec {
    let consigned = vec![
        ColumnSpec::stripped("Seller"),
        vehicle(),
        ColumnSpec::text("Price"),
        ColumnSpec::text("Stats"),
        ColumnSpec::text("Duration"),
        ColumnSpec::first_line("Agent"),
        ColumnSpec::link("Link"),
    ];
    TargetSpec {
        name: "consignment",
        kind: TargetKind::Listing {
            filter: 4,
            pages: 1..=3,
        },
        sections: vec![
            SectionSpec::heading("New", enquiry_columns("Created Date")),
            SectionSpec::heading("Followup", enquiry_columns("Follow-Up Date")),
            SectionSpec::heading("Appointment", enquiry_columns("Appointment Date")),
            SectionSpec::heading("Consigned", consigned),
        ],
    }
}

fn sold() -> TargetSpec {
    TargetSpec {
        name: "sold",
        kind: TargetKind::Listing {
            filter: 5,
            pages: 1..=2,
        },
        sections: vec![SectionSpec::first_table(
            "Sold",
            vec![
                ColumnSpec::stripped("Seller"),
                vehicle(),
                ColumnSpec::text("Price"),
                ColumnSpec::text("Sold Date"),
                ColumnSpec::first_line_as("Buyer", "Dealer Name"),
                ColumnSpec::link("Link"),
            ],
        )],
    }
}

fn void_enquiries() -> TargetSpec {
    TargetSpec {
        name: "void",
        kind: TargetKind::Listing {
            filter: 6,
            pages: 1..=1,
        },
        sections: vec![SectionSpec::first_table(
            "Void",
            vec![
                ColumnSpec::stripped("Seller"),
                vehicle(),
                ColumnSpec::first_line("Agent"),
                ColumnSpec::text("Void Date"),
                ColumnSpec::link("Link"),
            ],
        )],
    }
}

fn weekly_review() -> TargetSpec {
    let mut columns = vec![ColumnSpec::text("Category")];
    columns.extend(WEEKLY_METRICS.iter().copied().map(ColumnSpec::text));
    TargetSpec {
        name: WEEKLY_REVIEW_TARGET,
        kind: TargetKind::WeeklyReview,
        sections: vec![SectionSpec::css_class(
            "Weekly Sales",
            backoffice::REVIEW_TABLE_CLASS,
            columns,
        )],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::normalizer::filtered_header;
    use std::collections::HashSet;

    #[test]
    fn catalogue_names_are_unique() {
        let targets = builtin_targets();
        let names: HashSet<&str> = targets.iter().map(|t| t.name).collect();
        assert_eq!(names.len(), targets.len());
        assert_eq!(targets.len(), 7);
    }

    #[test]
    fn only_the_weekly_review_is_bucketed() {
        for target in builtin_targets() {
            assert_eq!(target.is_bucketed(), target.name == WEEKLY_REVIEW_TARGET);
        }
    }

    #[test]
    fn listing_filters_are_distinct_and_pages_bounded() {
        let mut filters = HashSet::new();
        for target in builtin_targets() {
            if let TargetKind::Listing { filter, pages } = &target.kind {
                assert!(filters.insert(*filter), "duplicate filter {}", filter);
                assert!(*pages.start() >= 1);
                assert!(*pages.end() <= 3);
            }
        }
        assert_eq!(filters.len(), 6);
    }

    #[test]
    fn consignment_new_expands_to_nine_filtered_columns() {
        let targets = builtin_targets();
        let consignment = targets.iter().find(|t| t.name == "consignment").unwrap();
        let new_section = &consignment.sections[0];
        assert_eq!(
            filtered_header(&new_section.columns),
            vec![
                "Seller",
                "Plate",
                "Model",
                "Manufacturing_date",
                "Details",
                "Country",
                "Agent",
                "Created Date",
                "Link"
            ]
        );
    }

    #[test]
    fn sold_buyer_becomes_dealer_name_in_filtered_variant() {
        let targets = builtin_targets();
        let sold = targets.iter().find(|t| t.name == "sold").unwrap();
        let header = filtered_header(&sold.sections[0].columns);
        assert!(header.contains(&"Dealer Name".to_string()));
        assert!(!header.contains(&"Buyer".to_string()));
        assert_eq!(sold.sections[0].raw_header()[4], "Buyer");
    }

    #[test]
    fn weekly_review_declares_category_plus_metrics() {
        let targets = builtin_targets();
        let weekly = targets.iter().find(|t| t.name == WEEKLY_REVIEW_TARGET).unwrap();
        let header = weekly.sections[0].raw_header();
        assert_eq!(header.len(), 14);
        assert_eq!(header[0], "Category");
        assert_eq!(header[13], "Total");
    }
}
