use super::*;
use image::Rgb;

fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[test]
fn vectors_are_unit_length_with_declared_dims() {
    let e = HistogramEmbedder::default();
    let img = RgbImage::from_fn(16, 8, |x, _| Rgb([(x * 16) as u8, 40, 200]));
    let v = e.encode(&img, "Magical pizza kingdom").unwrap();
    assert_eq!(v.len(), e.dims());
    assert_eq!(e.dims(), 64 + 64);
    assert!((norm(&v) - 1.0).abs() < 1e-5);
}

#[test]
fn encoding_is_deterministic() {
    let e = HistogramEmbedder::default();
    let img = RgbImage::from_pixel(4, 4, Rgb([10, 20, 30]));
    assert_eq!(e.encode(&img, "a b").unwrap(), e.encode(&img, "a b").unwrap());
}

#[test]
fn text_tokens_are_case_insensitive() {
    let e = HistogramEmbedder::default();
    let img = RgbImage::from_pixel(4, 4, Rgb([10, 20, 30]));
    let a = e.encode(&img, "Forest, Lake").unwrap();
    let b = e.encode(&img, "forest lake").unwrap();
    assert!((dot(&a, &b) - 1.0).abs() < 1e-5);
}

#[test]
fn similar_images_score_higher_than_different_ones() {
    let e = HistogramEmbedder::default();
    let red = RgbImage::from_pixel(8, 4, Rgb([250, 5, 5]));
    let red2 = RgbImage::from_pixel(8, 4, Rgb([240, 10, 0]));
    let blue = RgbImage::from_pixel(8, 4, Rgb([0, 10, 250]));
    let r = e.encode(&red, "").unwrap();
    assert!(dot(&r, &e.encode(&red2, "").unwrap()) > dot(&r, &e.encode(&blue, "").unwrap()));
}

#[test]
fn empty_image_is_an_embed_error() {
    let err = HistogramEmbedder::default()
        .encode(&RgbImage::new(0, 0), "x")
        .unwrap_err();
    assert!(err.to_string().starts_with("embedding error:"));
}

#[test]
fn custom_resolution_is_validated() {
    assert!(HistogramEmbedder::new(0, 8).unwrap_err().is_input());
    assert!(HistogramEmbedder::new(4, 0).unwrap_err().is_input());
    assert_eq!(HistogramEmbedder::new(2, 8).unwrap().dims(), 8 + 8);
}

#[test]
fn zero_vector_is_left_alone() {
    let mut v = [0.0f32; 3];
    assert!(!l2_normalize(&mut v));
    assert_eq!(v, [0.0; 3]);
}

#[test]
fn colour_labels_win_zero_shot() {
    let e = HistogramEmbedder::default();
    let red = RgbImage::from_pixel(8, 4, Rgb([250, 5, 5]));
    let probs = e
        .label_probabilities(&red, &["a red barn", "a blue lake", "a dog"])
        .unwrap();
    assert_eq!(probs.len(), 3);
    assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-5);
    assert!(probs[0] > 0.99);
}

#[test]
fn labels_without_signal_are_uniform() {
    let e = HistogramEmbedder::default();
    let img = RgbImage::from_pixel(4, 4, Rgb([10, 20, 30]));
    let probs = e.label_probabilities(&img, &["a mushroom", "a dog"]).unwrap();
    assert!((probs[0] - 0.5).abs() < 1e-6);
    assert!((probs[1] - 0.5).abs() < 1e-6);
}

#[test]
fn no_labels_is_an_input_error() {
    let img = RgbImage::from_pixel(4, 4, Rgb([10, 20, 30]));
    assert!(
        HistogramEmbedder::default()
            .label_probabilities(&img, &[])
            .unwrap_err()
            .is_input()
    );
}

#[test]
fn softmax_is_shift_stable() {
    let p = softmax(&[1000.0, 1000.0], 1.0);
    assert_eq!(p, vec![0.5, 0.5]);
}
