#![allow(non_snake_case)]
use RustedCalculus::Examples::calculus_examples::{integral_examples, polar_examples};
use RustedCalculus::Utils::logger::init_logger;

fn main() {
    if let Err(e) = init_logger("info", false) {
        println!("logging disabled: {}", e);
    }
    let example = 0;
    match example {
        0 => {
            integral_examples(0);
            polar_examples(0);
        }
        1 => {
            for i in 1..5 {
                integral_examples(i);
            }
        }
        2 => {
            for i in 1..3 {
                polar_examples(i);
            }
        }
        _ => println!("no such example"),
    }
}
