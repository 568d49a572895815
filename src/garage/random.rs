use rand::Rng;

use crate::garage::NewCar;

const CAR_BRANDS: [&str; 10] = [
    "Tesla", "Ford", "Toyota", "Honda", "Chevrolet",
    "BMW", "Mercedes", "Audi", "Volkswagen", "Porsche",
];

const CAR_MODELS: [&str; 10] = [
    "Model S", "Model 3", "Mustang", "Camry", "Civic",
    "Corvette", "X5", "E-Class", "A4", "911",
];

/// A car named "<brand> <model>" with a random `#rrggbb` color.
pub fn random_car<R: Rng + ?Sized>(rng: &mut R) -> NewCar {
    let brand = CAR_BRANDS[rng.gen_range(0..CAR_BRANDS.len())];
    let model = CAR_MODELS[rng.gen_range(0..CAR_MODELS.len())];
    let (r, g, b): (u8, u8, u8) = rng.gen();

    NewCar {
        name: format!["{} {}", brand, model],
        color: format!["#{:02x}{:02x}{:02x}", r, g, b],
    }
}
