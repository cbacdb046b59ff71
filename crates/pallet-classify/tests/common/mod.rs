#![allow(dead_code)]

use pallet_classify::InstanceList;

/// Small two-label corpus every algorithm can fit.
pub fn mail() -> InstanceList {
    let mut list = InstanceList::new();
    list.push_text("m1", Some("spam"), "win cash prize now");
    list.push_text("m2", Some("spam"), "cheap pills win big");
    list.push_text("m3", Some("spam"), "claim your cash prize");
    list.push_text("m4", Some("ham"), "meeting moved to noon");
    list.push_text("m5", Some("ham"), "lunch at noon with the team");
    list.push_text("m6", Some("ham"), "notes from the team meeting");
    list
}

/// Follow-up batch introducing a new label and new vocabulary.
pub fn mail_followup() -> InstanceList {
    let mut list = InstanceList::new();
    list.push_text("m7", Some("news"), "weekly digest headlines");
    list.push_text("m8", Some("news"), "headlines from the weekly digest");
    list.push_text("m9", Some("spam"), "win win win");
    list
}
