//! A refinery gasoline case: three grades, ten blending stocks.

use crate::property::Property;
use crate::request::{BlendRequest, Component, Grade};
use crate::spec::{Bound, SpecTable};

const REGULAR_PRICE: f64 = 100.0;
const GRADES: [&str; 3] = ["Regular", "Premium", "Super Premium"];

// id, name, cost factor against the regular price, then
// SPG SUL RON MON RVP E70 E10 E15 ARO BEN OXY OLEFIN ETH
#[rustfmt::skip]
const STOCKS: [(&str, &str, f64, [f64; 13]); 10] = [
    ("C4B", "Alkyl Butane", 1.30, [0.5844, 0.0001, 93.80, 89.60, 3.191, 100.0, 100.0, 100.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
    ("IS1", "Isomerate", 1.25, [0.6610, 0.5, 88.56, 86.15, 0.839, 92.0, 100.0, 100.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
    ("RFL", "Reformate", 1.05, [0.8190, 0.0, 97.00, 86.15, 0.139, 0.001, 4.0, 67.3, 61.8, 0.4384, 0.0, 0.7756, 0.0]),
    ("F5X", "Mixed RFC", 0.70, [0.6447, 10.0, 94.60, 89.65, 1.310, 100.0, 100.0, 100.0, 0.0, 1.16, 0.0, 57.7, 0.0]),
    ("RCG", "FCC Gasoline", 0.90, [0.7856, 20.0, 94.43, 82.44, 0.210, 8.8548, 36.4, 67.3, 50.4, 1.7183, 0.0, 19.67, 0.0]),
    ("IC4", "DIB IC4", 0.90, [0.5633, 10.0, 100.05, 97.54, 4.347, 100.0, 100.0, 100.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
    ("HBY", "SHIP C4", 0.75, [0.5936, 10.0, 98.20, 89.00, 3.674, 100.0, 100.0, 100.0, 0.0, 0.0, 0.0, 60.8, 0.0]),
    ("AKK", "Alkylate", 0.70, [0.7032, 0.0001, 76.13, 92.00, 0.403, 10.0, 35.0, 100.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
    ("ETH", "Ethanol", 0.75, [0.7910, 1.0, 128.00, 100.00, 1.329, 50.0, 100.0, 100.0, 0.0, 0.0, 34.78, 0.0, 100.0]),
    ("LTN", "Light Naptha", 0.75, [0.7910, 1.0, 128.00, 100.00, 1.329, 50.0, 100.0, 100.0, 0.0, 0.0, 34.78, 0.0, 0.0]),
];

/// The default refinery case, every component at ample availability.
pub fn refinery_request() -> BlendRequest {
    let grades = vec![
        Grade::new(GRADES[0], 4000.0, 400_000.0, REGULAR_PRICE),
        Grade::new(GRADES[1], 0.0, 400_000.0, 110.0),
        Grade::new(GRADES[2], 0.0, 4000.0, 200.0),
    ];

    let components = STOCKS
        .iter()
        .map(|(id, name, factor, values)| {
            Property::INPUTS.iter().zip(values).fold(
                Component::new(*id, factor * REGULAR_PRICE, 1_000_000.0).with_display_name(*name),
                |component, (&property, &value)| component.with_property(property, value),
            )
        })
        .collect();

    BlendRequest::new(grades, components, refinery_specs())
}

fn refinery_specs() -> SpecTable {
    let mut specs = SpecTable::new();
    let same_for_all = [
        (Property::Spg, Bound::new(0.72, 0.78)),
        (Property::Sul, Bound::at_most(10.0)),
        (Property::Rvp, Bound::at_most(0.7)),
        (Property::E70, Bound::new(22.0, 48.0)),
        (Property::E10, Bound::new(44.0, 70.0)),
        (Property::E15, Bound::at_least(76.0)),
        (Property::Aro, Bound::at_most(35.0)),
        (Property::Ben, Bound::at_most(1.0)),
        (Property::Oxy, Bound::at_most(2.7)),
        (Property::Olefin, Bound::at_most(15.0)),
        (Property::Eth, Bound::at_most(10.0)),
    ];
    for grade in GRADES {
        for (property, bound) in same_for_all {
            specs.set(property, grade, bound);
        }
    }
    for (grade, ron, mon) in [(GRADES[0], 91.0, 82.0), (GRADES[1], 95.0, 86.0), (GRADES[2], 98.0, 89.0)] {
        specs.set(Property::Ron, grade, Bound::at_least(ron));
        specs.set(Property::Mon, grade, Bound::at_least(mon));
    }
    specs
}
